//! Multi-class averaged perceptron.

use bincode::{
    de::Decoder,
    enc::Encoder,
    error::{DecodeError, EncodeError},
    Decode, Encode,
};
use hashbrown::HashMap;

use crate::errors::{Result, RudepError};

/// Leading magic number of every persisted model file.
pub(crate) const MODEL_MAGIC: u32 = 0x5255_4450; // "RUDP"

/// Format version of persisted model files.
pub(crate) const MODEL_VERSION: u32 = 1;

/// Kind byte of tagger model files.
pub(crate) const KIND_TAGGER: u8 = 1;

/// Kind byte of parser model files.
pub(crate) const KIND_PARSER: u8 = 2;

/// Writes the self-describing model file header.
pub(crate) fn encode_header<E: Encoder>(encoder: &mut E, kind: u8) -> Result<(), EncodeError> {
    Encode::encode(&MODEL_MAGIC, encoder)?;
    Encode::encode(&MODEL_VERSION, encoder)?;
    Encode::encode(&kind, encoder)
}

/// Validates the model file header against the expected kind.
pub(crate) fn decode_header<D: Decoder>(decoder: &mut D, expected_kind: u8) -> Result<(), DecodeError> {
    let magic: u32 = Decode::decode(decoder)?;
    if magic != MODEL_MAGIC {
        return Err(DecodeError::Other("not a rudep model file"));
    }
    let version: u32 = Decode::decode(decoder)?;
    if version != MODEL_VERSION {
        return Err(DecodeError::Other("unsupported model file version"));
    }
    let kind: u8 = Decode::decode(decoder)?;
    if kind != expected_kind {
        return Err(DecodeError::Other("model file holds a different model kind"));
    }
    Ok(())
}

/// Maps a decoding failure to the crate error type, keeping header messages.
pub(crate) fn model_error(e: DecodeError) -> RudepError {
    match e {
        DecodeError::Other(msg) => RudepError::model(msg),
        _ => RudepError::model("model file is corrupted"),
    }
}

/// Training bookkeeping for timestamp-based lazy averaging.
///
/// Every key present in the weight table has an independently-aged row here;
/// a weight's contribution to its running total is only folded in when the
/// weight is next touched, so an update step costs O(active features) instead
/// of O(all features).
struct History {
    totals: HashMap<String, Vec<f64>>,
    stamps: HashMap<String, Vec<u64>>,
}

/// An online multi-class linear classifier with averaged weights.
///
/// Classes are dense indices `0..n_classes`; the mapping to tag strings or
/// parser moves lives with the caller. Features are named strings; a feature
/// the model has never seen scores zero for every class.
///
/// A freshly created model is trainable. Calling [`Perceptron::average`]
/// replaces the live weights with their time-weighted averages and freezes
/// the model: further [`Perceptron::update`] calls fail. Decoded models are
/// always frozen, since only averaged weights are persisted.
pub struct Perceptron {
    n_classes: usize,
    weights: HashMap<String, Vec<f64>>,
    history: Option<History>,
    step: u64,
}

impl Perceptron {
    /// Creates a new trainable model over `n_classes` classes.
    #[must_use]
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            weights: HashMap::new(),
            history: Some(History {
                totals: HashMap::new(),
                stamps: HashMap::new(),
            }),
            step: 0,
        }
    }

    /// Returns the number of classes.
    #[inline(always)]
    #[must_use]
    pub const fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Returns `true` once [`Perceptron::average`] has run (or the model was
    /// decoded from persisted weights).
    #[inline(always)]
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.history.is_none()
    }

    /// Sums, per class, the weights of every present feature.
    ///
    /// Features are visited in slice order and classes in index order, so the
    /// result is reproducible for a given model regardless of map state.
    #[must_use]
    pub fn scores(&self, features: &[String]) -> Vec<f64> {
        let mut scores = vec![0.0; self.n_classes];
        for feature in features {
            if let Some(row) = self.weights.get(feature.as_str()) {
                for (score, weight) in scores.iter_mut().zip(row) {
                    *score += weight;
                }
            }
        }
        scores
    }

    /// Returns the arg-max class for the given features.
    ///
    /// Ties break to the lowest class index, which keeps predictions
    /// reproducible across runs.
    #[must_use]
    pub fn predict(&self, features: &[String]) -> usize {
        let scores = self.scores(features);
        let mut best = 0;
        let mut best_score = f64::NEG_INFINITY;
        for (class, &score) in scores.iter().enumerate() {
            if score > best_score {
                best_score = score;
                best = class;
            }
        }
        best
    }

    /// Records one training step.
    ///
    /// The step counter always advances; weights only move when the guess was
    /// wrong, in which case every active feature is promoted towards `truth`
    /// and demoted away from `guess`. Before a weight changes, the span it
    /// held its previous value is folded into its running total.
    ///
    /// # Errors
    ///
    /// [`RudepError::FrozenModel`] if the model has already been averaged.
    pub fn update(&mut self, truth: usize, guess: usize, features: &[String]) -> Result<()> {
        let Some(history) = self.history.as_mut() else {
            return Err(RudepError::FrozenModel);
        };
        self.step += 1;
        if truth == guess {
            return Ok(());
        }
        let n_classes = self.n_classes;
        for feature in features {
            let weights = self
                .weights
                .entry_ref(feature.as_str())
                .or_insert_with(|| vec![0.0; n_classes]);
            let totals = history
                .totals
                .entry_ref(feature.as_str())
                .or_insert_with(|| vec![0.0; n_classes]);
            let stamps = history
                .stamps
                .entry_ref(feature.as_str())
                .or_insert_with(|| vec![0; n_classes]);
            for (class, delta) in [(truth, 1.0), (guess, -1.0)] {
                totals[class] += (self.step - stamps[class]) as f64 * weights[class];
                stamps[class] = self.step;
                weights[class] += delta;
            }
        }
        Ok(())
    }

    /// Replaces the live weights with their averages over all training steps
    /// and freezes the model.
    ///
    /// Every tracked weight is first aged to the final step count. Calling
    /// this on an already-frozen model is a no-op.
    pub fn average(&mut self) {
        let Some(mut history) = self.history.take() else {
            return;
        };
        if self.step == 0 {
            return;
        }
        let n_classes = self.n_classes;
        let final_step = self.step;
        for (feature, weights) in &mut self.weights {
            let totals = history
                .totals
                .entry_ref(feature.as_str())
                .or_insert_with(|| vec![0.0; n_classes]);
            let stamps = history
                .stamps
                .entry_ref(feature.as_str())
                .or_insert_with(|| vec![0; n_classes]);
            for class in 0..n_classes {
                let total = totals[class] + (final_step - stamps[class]) as f64 * weights[class];
                weights[class] = total / final_step as f64;
            }
        }
    }
}

impl Encode for Perceptron {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        let mut rows: Vec<(&str, &[f64])> = self
            .weights
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
            .collect();
        rows.sort_unstable_by_key(|&(k, _)| k);
        Encode::encode(&self.n_classes, encoder)?;
        Encode::encode(&rows, encoder)?;
        Ok(())
    }
}

impl<Context> Decode<Context> for Perceptron {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let n_classes: usize = Decode::decode(decoder)?;
        let rows: Vec<(String, Vec<f64>)> = Decode::decode(decoder)?;
        let mut weights = HashMap::with_capacity(rows.len());
        for (feature, row) in rows {
            if row.len() != n_classes {
                return Err(DecodeError::Other("weight row does not match class count"));
            }
            weights.insert(feature, row);
        }
        Ok(Self {
            n_classes,
            weights,
            history: None,
            step: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feats(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unseen_features_score_zero() {
        let model = Perceptron::new(3);
        let scores = model.scores(&feats(&["w=never", "t=SEEN"]));
        assert_eq!(scores, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_predict_tie_breaks_to_lowest_class() {
        let model = Perceptron::new(4);
        assert_eq!(model.predict(&feats(&["bias"])), 0);
    }

    #[test]
    fn test_update_moves_weights() {
        let mut model = Perceptron::new(2);
        let fv = feats(&["bias", "w=dog"]);
        model.update(1, 0, &fv).unwrap();
        let scores = model.scores(&fv);
        assert_eq!(scores[1], 2.0);
        assert_eq!(scores[0], -2.0);
        assert_eq!(model.predict(&fv), 1);
    }

    #[test]
    fn test_correct_guess_only_advances_step() {
        let mut model = Perceptron::new(2);
        let fv = feats(&["bias"]);
        model.update(0, 0, &fv).unwrap();
        assert_eq!(model.scores(&fv), vec![0.0, 0.0]);
        assert_eq!(model.step, 1);
    }

    #[test]
    fn test_lazy_average_matches_weight_trajectory() {
        // Single feature, two classes. The weight for class 0 takes the
        // values 1, 1, 0 over three steps, so its average is 2/3; class 1
        // mirrors it at -2/3.
        let mut model = Perceptron::new(2);
        let fv = feats(&["f"]);
        model.update(0, 1, &fv).unwrap();
        model.update(0, 0, &fv).unwrap();
        model.update(1, 0, &fv).unwrap();
        model.average();
        let scores = model.scores(&fv);
        assert!((scores[0] - 2.0 / 3.0).abs() < f64::EPSILON);
        assert!((scores[1] + 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_average_freezes_model() {
        let mut model = Perceptron::new(2);
        let fv = feats(&["f"]);
        model.update(0, 1, &fv).unwrap();
        model.average();
        assert!(model.is_frozen());
        match model.update(0, 1, &fv) {
            Err(RudepError::FrozenModel) => {}
            other => panic!("expected FrozenModel, got {other:?}"),
        }
    }

    #[test]
    fn test_average_twice_is_noop() {
        let mut model = Perceptron::new(2);
        let fv = feats(&["f"]);
        model.update(0, 1, &fv).unwrap();
        model.average();
        let before = model.scores(&fv);
        model.average();
        assert_eq!(before, model.scores(&fv));
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let mut model = Perceptron::new(2);
        model.update(0, 1, &feats(&["f", "g"])).unwrap();
        model.update(1, 0, &feats(&["g"])).unwrap();
        model.average();

        let bytes = bincode::encode_to_vec(&model, bincode::config::standard()).unwrap();
        let (decoded, _): (Perceptron, usize) =
            bincode::decode_from_slice(&bytes, bincode::config::standard()).unwrap();

        assert!(decoded.is_frozen());
        assert_eq!(decoded.n_classes(), 2);
        let fv = feats(&["f", "g"]);
        assert_eq!(model.scores(&fv), decoded.scores(&fv));
    }
}
