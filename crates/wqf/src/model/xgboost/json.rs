//! XGBoost JSON model documents.
//!
//! Foreign types used only for parsing. Only the parts needed to rebuild
//! single-output tree ensembles are modelled; unknown fields are ignored.

use serde::{Deserialize, Deserializer};
use serde_with::{serde_as, DisplayFromStr};

/// `base_score` as written by different XGBoost versions: a number, a
/// numeric string, a one-element array, or a string holding such an array
/// (`"[5E-1]"`).
#[derive(Deserialize)]
#[serde(untagged)]
enum RawScore {
    Number(f64),
    Text(String),
    List(Vec<RawScore>),
}

impl RawScore {
    fn value(self) -> Result<f32, String> {
        match self {
            RawScore::Number(v) => Ok(v as f32),
            RawScore::List(items) => match items.into_iter().next() {
                Some(first) => first.value(),
                None => Err("base_score array is empty".to_string()),
            },
            RawScore::Text(text) => {
                let text = text.trim();
                if let Ok(v) = text.parse::<f32>() {
                    return Ok(v);
                }
                match serde_json::from_str::<RawScore>(text) {
                    Ok(RawScore::Text(_)) | Err(_) => {
                        Err(format!("cannot parse base_score '{text}'"))
                    }
                    Ok(inner) => inner.value(),
                }
            }
        }
    }
}

fn base_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
    RawScore::deserialize(deserializer)?
        .value()
        .map_err(serde::de::Error::custom)
}

fn one() -> i64 {
    1
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct TreeParam {
    #[serde_as(as = "DisplayFromStr")]
    pub num_nodes: i64,
    /// Outputs per leaf; `1` for scalar leaves.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default = "one")]
    pub size_leaf_vector: i64,
}

/// One tree in XGBoost's array-of-fields layout. Node `i` is described by
/// element `i` of every array; `-1` children mark leaves, whose value is
/// stored in `split_conditions`.
#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    pub tree_param: TreeParam,
    pub left_children: Vec<i32>,
    pub right_children: Vec<i32>,
    pub split_indices: Vec<i32>,
    pub split_conditions: Vec<f32>,
    pub default_left: Vec<i32>,
    pub base_weights: Vec<f32>,
    /// `1` marks a categorical split. Absent in older documents.
    #[serde(default)]
    pub split_type: Vec<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelTrees {
    pub trees: Vec<Tree>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GBTreeDefinition {
    pub model: ModelTrees,
}

/// The booster section, tagged by its `name`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum GradientBooster {
    Gbtree { model: ModelTrees },
    Gblinear {},
    Dart { gbtree: GBTreeDefinition, weight_drop: Vec<f32> },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Objective {
    pub name: String,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct LearnerModelParam {
    #[serde(deserialize_with = "base_score")]
    pub base_score: f32,
    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "num_class", default)]
    pub n_class: i64,
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default = "one")]
    pub num_target: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Learner {
    #[serde(default)]
    pub feature_names: Vec<String>,
    pub gradient_booster: GradientBooster,
    pub objective: Objective,
    pub learner_model_param: LearnerModelParam,
}

/// Root of an XGBoost JSON model document.
#[derive(Debug, Clone, Deserialize)]
pub struct XgbModel {
    pub learner: Learner,
}
