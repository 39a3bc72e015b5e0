//! Random forest classifier.
//!
//! An ensemble of CART trees grown on bootstrap samples with Gini impurity and
//! a random feature subset at every split. Prediction is a majority vote across
//! trees; ties go to the lowest class index.
//!
//! Feature importance is the mean decrease in impurity: each tree accumulates
//! the weighted impurity decrease of its splits per feature, normalizes to 1,
//! and the per-tree vectors are averaged and renormalized.

use crate::error::{ModelError, Result};
use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Number of features considered at each split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// `floor(sqrt(n_features))`, at least 1
    Sqrt,
    /// Every feature
    All,
    /// A fixed count, capped at the number of features
    Fixed(usize),
}

impl MaxFeatures {
    /// Resolve against the number of encoded features.
    pub fn resolve(&self, n_features: usize) -> usize {
        let k = match self {
            Self::Sqrt => (n_features as f64).sqrt().floor() as usize,
            Self::All => n_features,
            Self::Fixed(n) => *n,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Random forest configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees (default: 100)
    pub n_trees: usize,

    /// Maximum tree depth, unbounded when `None` (default: None)
    pub max_depth: Option<usize>,

    /// Minimum samples a node needs to be split (default: 2)
    pub min_samples_split: usize,

    /// Minimum samples in each child of a split (default: 1)
    pub min_samples_leaf: usize,

    /// Features drawn per split (default: Sqrt)
    pub max_features: MaxFeatures,

    /// Grow each tree on a bootstrap sample (default: true)
    pub bootstrap: bool,

    /// Base seed; tree `i` uses `seed + i` (default: 42)
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl ForestConfig {
    /// Check parameter ranges.
    ///
    /// # Errors
    /// Returns [`ModelError::InvalidConfig`] describing the first bad parameter.
    pub fn validate(&self) -> Result<()> {
        if self.n_trees == 0 {
            return Err(ModelError::InvalidConfig("n_trees must be > 0".to_string()));
        }
        if self.max_depth == Some(0) {
            return Err(ModelError::InvalidConfig(
                "max_depth must be > 0".to_string(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(ModelError::InvalidConfig(
                "min_samples_split must be >= 2".to_string(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(ModelError::InvalidConfig(
                "min_samples_leaf must be >= 1".to_string(),
            ));
        }
        if self.max_features == MaxFeatures::Fixed(0) {
            return Err(ModelError::InvalidConfig(
                "max_features must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Tree node, addressed by its index in the tree arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Terminal node
    Leaf {
        /// Majority class of the training samples that reached it
        class: usize,
        /// Number of those samples
        samples: usize,
    },
    /// Internal node: `x[feature] <= threshold` goes left
    Split {
        /// Encoded feature index
        feature: usize,
        /// Split threshold
        threshold: f64,
        /// Left child index
        left: usize,
        /// Right child index
        right: usize,
    },
}

/// Single CART tree stored as a node arena; the root is node 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl DecisionTree {
    /// Class predicted for one encoded row.
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> usize {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { class, .. } => return *class,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Arena of nodes.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Depth of the deepest leaf (a lone root has depth 0).
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let Node::Split { left, right, .. } = &self.nodes[idx] {
                stack.push((*left, depth + 1));
                stack.push((*right, depth + 1));
            }
        }
        max_depth
    }

    /// Normalized impurity decrease per feature (all zero for a single leaf).
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    decrease: f64,
}

struct TreeBuilder<'a, 'x> {
    x: ArrayView2<'x, f64>,
    y: &'a [usize],
    n_classes: usize,
    max_features: usize,
    config: &'a ForestConfig,
    rng: StdRng,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl TreeBuilder<'_, '_> {
    fn build(&mut self, indices: &[usize], depth: usize) -> usize {
        let counts = self.class_counts(indices);
        let n = indices.len();
        let node_id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            class: argmax(&counts),
            samples: n,
        });

        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let depth_reached = self.config.max_depth.is_some_and(|d| depth >= d);
        if pure
            || depth_reached
            || n < self.config.min_samples_split
            || n < 2 * self.config.min_samples_leaf
        {
            return node_id;
        }

        let Some(split) = self.find_split(indices, &counts) else {
            return node_id;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| self.x[[i, split.feature]] <= split.threshold);

        self.importances[split.feature] += split.decrease;
        let left = self.build(&left_idx, depth + 1);
        let right = self.build(&right_idx, depth + 1);
        self.nodes[node_id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_id
    }

    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &i in indices {
            counts[self.y[i]] += 1;
        }
        counts
    }

    /// Draw features in random order until `max_features` non-constant ones
    /// have been evaluated; keep the largest impurity decrease.
    fn find_split(&mut self, indices: &[usize], counts: &[usize]) -> Option<SplitCandidate> {
        let n = indices.len();
        let min_leaf = self.config.min_samples_leaf;
        let parent = gini(counts, n);

        let mut features: Vec<usize> = (0..self.x.ncols()).collect();
        features.shuffle(&mut self.rng);

        let mut tried = 0;
        let mut best: Option<SplitCandidate> = None;
        let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(n);

        for feature in features {
            if tried >= self.max_features {
                break;
            }

            sorted.clear();
            sorted.extend(indices.iter().map(|&i| (self.x[[i, feature]], self.y[i])));
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
            if sorted[0].0 == sorted[n - 1].0 {
                continue;
            }
            tried += 1;

            let mut left = vec![0usize; self.n_classes];
            let mut right = counts.to_vec();
            for k in 0..n - 1 {
                let (value, class) = sorted[k];
                left[class] += 1;
                right[class] -= 1;

                let next = sorted[k + 1].0;
                if value == next {
                    continue;
                }
                let n_left = k + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let decrease = n as f64 * parent
                    - n_left as f64 * gini(&left, n_left)
                    - n_right as f64 * gini(&right, n_right);
                if best.as_ref().is_none_or(|b| decrease > b.decrease) {
                    let mut threshold = value + (next - value) / 2.0;
                    if threshold >= next {
                        threshold = value;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        decrease,
                    });
                }
            }
        }

        best
    }
}

fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

/// Index of the largest count, lowest index on ties.
fn argmax(counts: &[usize]) -> usize {
    let mut best = 0;
    for (i, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = i;
        }
    }
    best
}

fn normalize(values: &mut [f64]) {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        for v in values.iter_mut() {
            *v /= total;
        }
    }
}

/// Random forest classifier over encoded feature matrices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<DecisionTree>,
    n_features: usize,
    n_classes: usize,
    importances: Vec<f64>,
}

impl RandomForest {
    /// Create an unfitted forest.
    ///
    /// # Errors
    /// Returns [`ModelError::InvalidConfig`] if the configuration is invalid.
    pub fn new(config: ForestConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            trees: Vec::new(),
            n_features: 0,
            n_classes: 0,
            importances: Vec::new(),
        })
    }

    /// Fit on encoded rows `x` and class indices `y` in `0..n_classes`.
    ///
    /// Refitting replaces every tree.
    pub fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[usize], n_classes: usize) -> Result<()> {
        let (n_samples, n_features) = x.dim();
        if n_samples == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        if y.len() != n_samples {
            return Err(ModelError::DimensionMismatch {
                expected: n_samples,
                actual: y.len(),
            });
        }
        if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
            return Err(ModelError::InvalidConfig(format!(
                "label {} outside {} classes",
                bad, n_classes
            )));
        }

        let max_features = self.config.max_features.resolve(n_features);
        info!(
            "Fitting random forest: {} trees, {} samples x {} features, {} classes, max_features {}",
            self.config.n_trees, n_samples, n_features, n_classes, max_features
        );

        let mut trees = Vec::with_capacity(self.config.n_trees);
        let mut importances = vec![0.0; n_features];

        for t in 0..self.config.n_trees {
            let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(t as u64));
            let sample: Vec<usize> = if self.config.bootstrap {
                (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
            } else {
                (0..n_samples).collect()
            };

            let mut builder = TreeBuilder {
                x,
                y,
                n_classes,
                max_features,
                config: &self.config,
                rng,
                nodes: Vec::new(),
                importances: vec![0.0; n_features],
            };
            builder.build(&sample, 0);
            normalize(&mut builder.importances);

            for (acc, v) in importances.iter_mut().zip(&builder.importances) {
                *acc += v;
            }
            let tree = DecisionTree {
                nodes: builder.nodes,
                importances: builder.importances,
            };
            debug!("tree {}: {} nodes, depth {}", t, tree.nodes.len(), tree.depth());
            trees.push(tree);
        }

        normalize(&mut importances);

        self.trees = trees;
        self.n_features = n_features;
        self.n_classes = n_classes;
        self.importances = importances;
        Ok(())
    }

    /// Majority vote for one encoded row.
    ///
    /// # Errors
    /// [`ModelError::NotFitted`] before `fit`, [`ModelError::DimensionMismatch`]
    /// if the row width differs from the training width.
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> Result<usize> {
        if !self.is_fitted() {
            return Err(ModelError::NotFitted);
        }
        if row.len() != self.n_features {
            return Err(ModelError::DimensionMismatch {
                expected: self.n_features,
                actual: row.len(),
            });
        }

        let mut votes = vec![0usize; self.n_classes];
        for tree in &self.trees {
            votes[tree.predict_row(row)] += 1;
        }
        Ok(argmax(&votes))
    }

    /// Predict every row of `x`.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        x.rows()
            .into_iter()
            .map(|row| self.predict_row(row))
            .collect()
    }

    /// Mean decrease in impurity per encoded feature, summing to 1.
    ///
    /// Empty before fitting; all zeros if no tree ever split.
    pub fn feature_importances(&self) -> Array1<f64> {
        Array1::from(self.importances.clone())
    }

    /// Whether `fit` has completed.
    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Fitted trees.
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Configuration used for fitting.
    pub const fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Number of encoded features seen at fit time.
    pub const fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of classes.
    pub const fn n_classes(&self) -> usize {
        self.n_classes
    }
}
