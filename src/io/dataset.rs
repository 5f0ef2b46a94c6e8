//! JSON dataset document.
//!
//! A small self-describing layout for array data: named dimensions, typed
//! variables with string attributes, and global attributes. 2-D variables
//! are stored flattened row-major in the order of their `dims`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::DensityField;

pub const DIM_X: &str = "x";
pub const DIM_Y: &str = "y";
pub const VAR_DENSITY: &str = "density";

const DTYPE_F64: &str = "f64";
const LENGTH_UNITS: &str = "Meters";
const GRID_MAPPING: &str = "albers_conical_equal_area";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub dimensions: BTreeMap<String, usize>,
    pub variables: BTreeMap<String, Variable>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    #[serde(default)]
    pub dims: Vec<String>,
    #[serde(default = "default_dtype")]
    pub dtype: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    pub data: Vec<f64>,
}

fn default_dtype() -> String {
    DTYPE_F64.to_string()
}

impl Dataset {
    /// Lay out a density field with projection-coordinate metadata.
    ///
    /// `history` becomes the global provenance attribute.
    pub fn from_field(field: &DensityField, history: String) -> Self {
        let (nx, ny) = field.grid.shape();

        let mut dimensions = BTreeMap::new();
        dimensions.insert(DIM_X.to_string(), nx);
        dimensions.insert(DIM_Y.to_string(), ny);

        let mut variables = BTreeMap::new();
        variables.insert(
            DIM_X.to_string(),
            coordinate_variable(DIM_X, field.grid.xs().to_vec()),
        );
        variables.insert(
            DIM_Y.to_string(),
            coordinate_variable(DIM_Y, field.grid.ys().to_vec()),
        );
        variables.insert(
            VAR_DENSITY.to_string(),
            Variable {
                dims: vec![DIM_X.to_string(), DIM_Y.to_string()],
                dtype: default_dtype(),
                attributes: attrs(&[
                    ("units", "percent"),
                    ("grid_mapping", GRID_MAPPING),
                    ("coordinates", "x y"),
                ]),
                data: field.density.values().to_vec(),
            },
        );

        let mut attributes = BTreeMap::new();
        attributes.insert("history".to_string(), history);

        Self {
            dimensions,
            variables,
            attributes,
        }
    }
}

fn coordinate_variable(axis: &str, data: Vec<f64>) -> Variable {
    let standard_name = format!("projection_{axis}_coordinate");
    let long_name = format!("{axis} coordinate of projection");
    Variable {
        dims: vec![axis.to_string()],
        dtype: default_dtype(),
        attributes: attrs(&[
            ("units", LENGTH_UNITS),
            ("standard_name", standard_name.as_str()),
            ("long_name", long_name.as_str()),
        ]),
        data,
    }
}

fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
