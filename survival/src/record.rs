use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 特征向量长度。
pub const FEATURE_COUNT: usize = 9;

/// 特征名称，顺序即模型输入顺序。
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "marital_status",
    "race_code",
    "age",
    "grade",
    "tumor_size",
    "surgery_flag",
    "sequence_number",
    "positive_nodes_count",
    "invasion_flag",
];

/// 请求中单个字段的原始取值：表单可能提交字符串，也可能直接提交数字。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Text(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

/// 特征组装失败的原因。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    /// 种族取值不在固定词表内。
    #[error("unknown race value {value} (expected White, Black or Other)")]
    UnknownRace { value: String },
    /// 数值字段无法解析为整数。
    #[error("field {field} is not an integer: {value}")]
    NotAnInteger { field: &'static str, value: String },
}

/// 单条患者记录，字段名与前端表单保持一致。
///
/// 九个字段均为必填；字段之间没有联合校验。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    #[serde(rename = "MAR_STAT_MOD")]
    pub marital_status: FieldValue,
    #[serde(rename = "RACE_MOD")]
    pub race: FieldValue,
    #[serde(rename = "AGE_DX")]
    pub age: FieldValue,
    #[serde(rename = "GRADE")]
    pub grade: FieldValue,
    #[serde(rename = "TUMSIZ")]
    pub tumor_size: FieldValue,
    #[serde(rename = "SURG")]
    pub surgery: FieldValue,
    #[serde(rename = "SEQ_NUM")]
    pub sequence_number: FieldValue,
    #[serde(rename = "POS_NODES")]
    pub positive_nodes: FieldValue,
    #[serde(rename = "INVAS")]
    pub invasion: FieldValue,
}

impl PatientRecord {
    /// 内置示例记录，供命令行工具在未提供输入时使用。
    pub fn example() -> Self {
        Self {
            marital_status: FieldValue::Integer(1),
            race: "Other".into(),
            age: FieldValue::Integer(50),
            grade: FieldValue::Integer(1),
            tumor_size: FieldValue::Integer(1),
            surgery: FieldValue::Integer(1),
            sequence_number: FieldValue::Integer(0),
            positive_nodes: FieldValue::Integer(0),
            invasion: FieldValue::Integer(0),
        }
    }
}

/// 种族编码的固定词表。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Race {
    White,
    Black,
    Other,
}

impl Race {
    /// 精确匹配（区分大小写）；词表外的取值一律报错，不做兜底。
    pub fn lookup(value: &FieldValue) -> Result<Self, FeatureError> {
        match value {
            FieldValue::Text(text) => match text.as_str() {
                "White" => Ok(Race::White),
                "Black" => Ok(Race::Black),
                "Other" => Ok(Race::Other),
                _ => Err(FeatureError::UnknownRace {
                    value: value.to_string(),
                }),
            },
            _ => Err(FeatureError::UnknownRace {
                value: value.to_string(),
            }),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Race::White => 1,
            Race::Black => 2,
            Race::Other => 3,
        }
    }
}

/// 将字段按整数解析。
///
/// - 整数原样返回；
/// - 浮点数向零截断；
/// - 字符串去除首尾空白后解析，允许正负号与前导零（`"01"` → 1）。
pub fn parse_integer(field: &'static str, value: &FieldValue) -> Result<i64, FeatureError> {
    let not_an_integer = || FeatureError::NotAnInteger {
        field,
        value: value.to_string(),
    };

    match value {
        FieldValue::Integer(v) => Ok(*v),
        FieldValue::Float(v) => {
            // i64::MAX as f64 向上取整为 2^63，因此上界用严格小于。
            if v.is_finite() && *v >= i64::MIN as f64 && *v < i64::MAX as f64 {
                Ok(v.trunc() as i64)
            } else {
                Err(not_an_integer())
            }
        }
        FieldValue::Text(text) => text.trim().parse::<i64>().map_err(|_| not_an_integer()),
    }
}

/// 序号字段：只有字符串 `"1"` 被编码为 0，其余取值（包括数字 1 与 `"01"`）按整数解析。
///
/// 该规则来自历史数据编码，无法确认是否有意为之，保持原样。
pub fn sequence_number(value: &FieldValue) -> Result<i64, FeatureError> {
    match value {
        FieldValue::Text(text) if text == "1" => Ok(0),
        other => parse_integer("SEQ_NUM", other),
    }
}

/// 固定顺序的模型输入。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureVector([i64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn new(values: [i64; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    pub fn as_array(&self) -> &[i64; FEATURE_COUNT] {
        &self.0
    }

    /// 转为浮点，供树模型比较阈值。
    pub fn to_f64(&self) -> [f64; FEATURE_COUNT] {
        self.0.map(|v| v as f64)
    }
}

/// 按固定顺序组装特征向量，遇到第一个非法字段即返回错误。
pub fn assemble_features(record: &PatientRecord) -> Result<FeatureVector, FeatureError> {
    Ok(FeatureVector([
        parse_integer("MAR_STAT_MOD", &record.marital_status)?,
        Race::lookup(&record.race)?.code(),
        parse_integer("AGE_DX", &record.age)?,
        parse_integer("GRADE", &record.grade)?,
        parse_integer("TUMSIZ", &record.tumor_size)?,
        parse_integer("SURG", &record.surgery)?,
        sequence_number(&record.sequence_number)?,
        parse_integer("POS_NODES", &record.positive_nodes)?,
        parse_integer("INVAS", &record.invasion)?,
    ]))
}
