//! Random forest over `linfa-trees` CART trees.
//!
//! Each tree is fit on a bootstrap sample of the rows (drawn with
//! replacement, same size as the input) and on a random subset of the
//! feature columns ([`FeatureSubset`], `ceil(sqrt(F))` by default). The
//! subset is drawn once per tree: `linfa-trees` offers no per-split feature
//! sampling. Prediction is a majority vote; ties go to the lowest class id
//! so results are reproducible.
use anyhow::{bail, Context, Result};
use linfa::prelude::*;
use linfa::Dataset;
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::{FeatureSubset, PipelineConfig};

/// Forest hyper-parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    pub max_features: FeatureSubset,
    pub seed: u64,
}

impl From<&PipelineConfig> for ForestParams {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            n_trees: cfg.n_trees,
            max_depth: cfg.max_depth,
            min_samples_leaf: cfg.min_samples_leaf,
            max_features: cfg.max_features,
            seed: cfg.seed,
        }
    }
}

struct Member {
    tree: DecisionTree<f64, usize>,
    /// Columns of the full feature matrix this tree was trained on.
    features: Vec<usize>,
}

pub struct RandomForest {
    members: Vec<Member>,
    n_features: usize,
    n_classes: usize,
}

impl RandomForest {
    /// Fit on `x` (`[N, F]`) against class ids `y` (`[N]`).
    pub fn fit(x: &Array2<f64>, y: &Array1<usize>, params: &ForestParams) -> Result<Self> {
        let (n, n_features) = x.dim();
        if n == 0 {
            bail!("cannot fit a forest on an empty table");
        }
        if y.len() != n {
            bail!("{n} feature rows but {} targets", y.len());
        }
        if params.n_trees == 0 {
            bail!("forest needs at least one tree");
        }
        let n_classes = y.iter().copied().max().unwrap_or(0) + 1;
        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut members = Vec::with_capacity(params.n_trees);

        for t in 0..params.n_trees {
            let rows: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
            let features = draw_features(n_features, params.max_features, &mut rng);

            let xs = x.select(Axis(0), &rows).select(Axis(1), &features);
            let ys = y.select(Axis(0), &rows);
            let dataset = Dataset::new(xs, ys);

            let tree = DecisionTree::<f64, usize>::params()
                .split_quality(SplitQuality::Gini)
                .max_depth(params.max_depth)
                .min_weight_leaf(params.min_samples_leaf.max(1) as f32)
                .min_weight_split(2.0 * params.min_samples_leaf.max(1) as f32)
                .fit(&dataset)
                .with_context(|| format!("fit tree {t}"))?;
            members.push(Member { tree, features });
        }

        tracing::debug!(trees = members.len(), n, n_features, n_classes, "fitted random forest");
        Ok(Self { members, n_features, n_classes })
    }

    /// Per-class vote counts `[N, n_classes]`.
    pub fn votes(&self, x: &Array2<f64>) -> Result<Array2<usize>> {
        if x.ncols() != self.n_features {
            bail!("forest was fit on {} features, got {}", self.n_features, x.ncols());
        }
        let mut votes = Array2::<usize>::zeros((x.nrows(), self.n_classes));
        for m in &self.members {
            let xs = x.select(Axis(1), &m.features);
            let pred: Array1<usize> = m.tree.predict(&xs);
            for (i, &class) in pred.iter().enumerate() {
                if class < self.n_classes {
                    votes[[i, class]] += 1;
                }
            }
        }
        Ok(votes)
    }

    /// Majority-vote class id per row.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        let votes = self.votes(x)?;
        Ok(votes
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0usize, 0usize), |best, (class, &v)| if v > best.1 { (class, v) } else { best })
                    .0
            })
            .collect())
    }

    pub fn n_trees(&self) -> usize {
        self.members.len()
    }

    /// Depth of the deepest tree.
    pub fn depth(&self) -> usize {
        self.members.iter().map(|m| m.tree.max_depth()).max().unwrap_or(0)
    }

    /// Leaves summed over all trees.
    pub fn n_leaves(&self) -> usize {
        self.members.iter().map(|m| m.tree.num_leaves()).sum()
    }
}

fn draw_features(n_features: usize, subset: FeatureSubset, rng: &mut StdRng) -> Vec<usize> {
    let mut all: Vec<usize> = (0..n_features).collect();
    let k = subset.size(n_features);
    if k < n_features {
        all.shuffle(rng);
        all.truncate(k);
        all.sort_unstable();
    }
    all
}
