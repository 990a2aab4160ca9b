use crate::record::{FEATURE_COUNT, FeatureVector};
use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};

/// 二分类概率：`negative` 对应类别 0，`positive` 对应类别 1（存活）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassProbabilities {
    pub negative: f64,
    pub positive: f64,
}

/// 能输出二分类概率的模型。启动时加载一次，之后只读共享。
pub trait ProbabilityModel: Send + Sync {
    fn predict_proba(&self, features: &FeatureVector) -> Result<ClassProbabilities>;
}

/// 回归树节点。样本满足 `x[feature] <= threshold` 时走左子树。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// 单棵回归树，节点 0 为根。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    fn evaluate(&self, sample: &[f64; FEATURE_COUNT]) -> Result<f64> {
        let mut index = 0usize;
        // 合法的树最多经过 nodes.len() 个节点，超过说明存在环。
        for _ in 0..self.nodes.len() {
            match self.nodes.get(index) {
                Some(TreeNode::Leaf { value }) => return Ok(*value),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let x = sample
                        .get(*feature)
                        .ok_or_else(|| anyhow!("特征下标越界：{feature}"))?;
                    index = if *x <= *threshold { *left } else { *right };
                }
                None => bail!("节点下标越界：{index}"),
            }
        }
        bail!("回归树中存在环，无法到达叶子节点")
    }

    fn validate(&self, tree_index: usize, n_features: usize) -> Result<()> {
        if self.nodes.is_empty() {
            bail!("第 {tree_index} 棵树没有节点");
        }
        for (node_index, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        bail!("第 {tree_index} 棵树节点 {node_index} 的特征下标 {feature} 越界");
                    }
                    if !threshold.is_finite() {
                        bail!("第 {tree_index} 棵树节点 {node_index} 的阈值不是有限数");
                    }
                    if *left >= self.nodes.len() || *right >= self.nodes.len() {
                        bail!("第 {tree_index} 棵树节点 {node_index} 的子节点下标越界");
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        bail!("第 {tree_index} 棵树节点 {node_index} 的叶子值不是有限数");
                    }
                }
            }
        }
        Ok(())
    }
}

/// 二分类梯度提升树：`init_score + learning_rate * Σ tree(x)` 经 logistic 函数得到正类概率。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    pub n_features: usize,
    pub init_score: f64,
    pub learning_rate: f64,
    pub trees: Vec<RegressionTree>,
}

impl GradientBoostedTrees {
    /// 从 JSON 模型文件加载并校验。
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("无法读取模型文件：{}", path.display()))?;
        let model: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("解析模型文件失败：{}", path.display()))?;
        model
            .validate()
            .with_context(|| format!("模型文件校验失败：{}", path.display()))?;
        Ok(model)
    }

    /// 从 JSON 字符串构建，主要用于测试与嵌入式模型。
    pub fn from_json_str(json: &str) -> Result<Self> {
        let model: Self = serde_json::from_str(json).context("解析模型 JSON 失败")?;
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_features != FEATURE_COUNT {
            bail!(
                "模型特征数为 {}，与输入向量长度 {} 不一致",
                self.n_features,
                FEATURE_COUNT
            );
        }
        if self.trees.is_empty() {
            bail!("模型不包含任何树");
        }
        if !self.init_score.is_finite() || !self.learning_rate.is_finite() {
            bail!("init_score 与 learning_rate 必须是有限数");
        }
        for (tree_index, tree) in self.trees.iter().enumerate() {
            tree.validate(tree_index, self.n_features)?;
        }
        Ok(())
    }

    /// 原始得分（log-odds）。
    pub fn decision_function(&self, features: &FeatureVector) -> Result<f64> {
        let sample = features.to_f64();
        let mut sum = 0.0;
        for tree in &self.trees {
            sum += tree.evaluate(&sample)?;
        }
        Ok(self.init_score + self.learning_rate * sum)
    }
}

impl ProbabilityModel for GradientBoostedTrees {
    fn predict_proba(&self, features: &FeatureVector) -> Result<ClassProbabilities> {
        let raw = self.decision_function(features)?;
        let positive = 1.0 / (1.0 + (-raw).exp());
        Ok(ClassProbabilities {
            negative: 1.0 - positive,
            positive,
        })
    }
}
