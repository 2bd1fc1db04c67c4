//! Feature schema and one-hot encoding of risk factors.
//!
//! A [`FeatureSchema`] is the ordered list of column names a classifier was
//! trained on. Each known name maps to a typed [`Column`], and the position of
//! every column is resolved once when the schema is built, so encoding a
//! request never matches strings.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// A category value that is not part of its group.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {group} category {value:?}")]
pub struct UnknownCategory {
    pub group: &'static str,
    pub value: String,
}

/// Every column the encoder knows how to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Age,
    GenderMale,
    GenotypeAa,
    BloodGroupAb,
    Temperature,
    Humidity,
    AirQualityIndex,
    GenderFemale,
    GenotypeAs,
    GenotypeSs,
    BloodGroupA,
    BloodGroupB,
    BloodGroupO,
}

impl Column {
    pub const COUNT: usize = 13;

    /// Columns in the order freshly trained models use.
    pub const ALL: [Column; Column::COUNT] = [
        Column::Age,
        Column::GenderMale,
        Column::GenotypeAa,
        Column::BloodGroupAb,
        Column::Temperature,
        Column::Humidity,
        Column::AirQualityIndex,
        Column::GenderFemale,
        Column::GenotypeAs,
        Column::GenotypeSs,
        Column::BloodGroupA,
        Column::BloodGroupB,
        Column::BloodGroupO,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::Age => "Age",
            Column::GenderMale => "Gender_Male",
            Column::GenotypeAa => "Genotype_AA",
            Column::BloodGroupAb => "BloodGroup_AB",
            Column::Temperature => "Temperature",
            Column::Humidity => "Humidity",
            Column::AirQualityIndex => "AirQualityIndex",
            Column::GenderFemale => "Gender_Female",
            Column::GenotypeAs => "Genotype_AS",
            Column::GenotypeSs => "Genotype_SS",
            Column::BloodGroupA => "BloodGroup_A",
            Column::BloodGroupB => "BloodGroup_B",
            Column::BloodGroupO => "BloodGroup_O",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Column::ALL.into_iter().find(|c| c.name() == name)
    }

    fn slot(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub const ALL: [Gender; 2] = [Gender::Male, Gender::Female];

    pub fn column(self) -> Column {
        match self {
            Gender::Male => Column::GenderMale,
            Gender::Female => Column::GenderFemale,
        }
    }
}

impl FromStr for Gender {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Male" => Ok(Gender::Male),
            "Female" => Ok(Gender::Female),
            other => Err(UnknownCategory {
                group: "gender",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Genotype {
    AA,
    AS,
    SS,
}

impl Genotype {
    pub const ALL: [Genotype; 3] = [Genotype::AA, Genotype::AS, Genotype::SS];

    pub fn column(self) -> Column {
        match self {
            Genotype::AA => Column::GenotypeAa,
            Genotype::AS => Column::GenotypeAs,
            Genotype::SS => Column::GenotypeSs,
        }
    }
}

impl FromStr for Genotype {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AA" => Ok(Genotype::AA),
            "AS" => Ok(Genotype::AS),
            "SS" => Ok(Genotype::SS),
            other => Err(UnknownCategory {
                group: "genotype",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BloodGroup {
    A,
    B,
    AB,
    O,
}

impl BloodGroup {
    pub const ALL: [BloodGroup; 4] = [BloodGroup::A, BloodGroup::B, BloodGroup::AB, BloodGroup::O];

    pub fn column(self) -> Column {
        match self {
            BloodGroup::A => Column::BloodGroupA,
            BloodGroup::B => Column::BloodGroupB,
            BloodGroup::AB => Column::BloodGroupAb,
            BloodGroup::O => Column::BloodGroupO,
        }
    }
}

impl FromStr for BloodGroup {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(BloodGroup::A),
            "B" => Ok(BloodGroup::B),
            "AB" => Ok(BloodGroup::AB),
            "O" => Ok(BloodGroup::O),
            other => Err(UnknownCategory {
                group: "blood group",
                value: other.to_string(),
            }),
        }
    }
}

/// Parses a category, logging and discarding values outside the group.
pub fn parse_category<T>(raw: &str) -> Option<T>
where
    T: FromStr<Err = UnknownCategory>,
{
    match raw.parse() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(%err, "ignoring unknown category");
            None
        }
    }
}

/// Typed attributes of a single prediction request.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskFactors {
    pub age: i64,
    pub gender: Option<Gender>,
    pub genotype: Option<Genotype>,
    pub blood_group: Option<BloodGroup>,
    pub temperature: f64,
    pub humidity: f64,
    pub air_quality: i64,
}

impl RiskFactors {
    /// Builds risk factors from already-parsed numbers and raw category strings.
    /// Unknown categories leave their group unset.
    pub fn new(
        age: i64,
        gender: &str,
        genotype: &str,
        blood_group: &str,
        temperature: f64,
        humidity: f64,
        air_quality: i64,
    ) -> Self {
        RiskFactors {
            age,
            gender: parse_category(gender),
            genotype: parse_category(genotype),
            blood_group: parse_category(blood_group),
            temperature,
            humidity,
            air_quality,
        }
    }

    fn value_of(&self, column: Column) -> f64 {
        let hot = |set: bool| if set { 1.0 } else { 0.0 };
        match column {
            Column::Age => self.age as f64,
            Column::Temperature => self.temperature,
            Column::Humidity => self.humidity,
            Column::AirQualityIndex => self.air_quality as f64,
            indicator => hot(self.gender.map(Gender::column) == Some(indicator)
                || self.genotype.map(Genotype::column) == Some(indicator)
                || self.blood_group.map(BloodGroup::column) == Some(indicator)),
        }
    }
}

/// Ordered column names of a trained model, with typed column positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct FeatureSchema {
    names: Vec<String>,
    positions: [Option<usize>; Column::COUNT],
}

impl FeatureSchema {
    /// Resolves column positions. Unrecognised names are kept but never filled;
    /// a duplicated name resolves to its first occurrence.
    pub fn new(names: Vec<String>) -> Self {
        let mut positions = [None; Column::COUNT];
        for (idx, name) in names.iter().enumerate() {
            if let Some(column) = Column::from_name(name) {
                let slot = &mut positions[column.slot()];
                if slot.is_none() {
                    *slot = Some(idx);
                }
            }
        }
        FeatureSchema { names, positions }
    }

    /// The schema freshly trained models are given.
    pub fn canonical() -> Self {
        FeatureSchema::new(Column::ALL.iter().map(|c| c.name().to_string()).collect())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position(&self, column: Column) -> Option<usize> {
        self.positions[column.slot()]
    }

    /// Typed columns in schema order; `None` marks a column the encoder never fills.
    pub fn columns(&self) -> impl Iterator<Item = Option<Column>> + '_ {
        self.names.iter().map(|name| Column::from_name(name))
    }

    /// Builds a zero-filled vector in schema order and sets every column the
    /// schema knows about.
    pub fn encode(&self, factors: &RiskFactors) -> Array1<f64> {
        let mut row = Array1::zeros(self.len());
        for column in Column::ALL {
            if let Some(idx) = self.position(column) {
                row[idx] = factors.value_of(column);
            }
        }
        row
    }
}

impl From<Vec<String>> for FeatureSchema {
    fn from(names: Vec<String>) -> Self {
        FeatureSchema::new(names)
    }
}

impl From<FeatureSchema> for Vec<String> {
    fn from(schema: FeatureSchema) -> Self {
        schema.names
    }
}
