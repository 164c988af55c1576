//! Greedy averaged-perceptron part-of-speech tagging.

use std::fs::File;
use std::io::{Read, Write};
use std::mem;
use std::path::Path;

use bincode::{
    de::Decoder,
    enc::Encoder,
    error::{DecodeError, EncodeError},
    Decode, Encode,
};
use hashbrown::HashMap;
#[cfg(feature = "train")]
use log::{debug, info};
#[cfg(feature = "train")]
use rand::seq::SliceRandom;
#[cfg(feature = "train")]
use rand::SeedableRng;
#[cfg(feature = "train")]
use rand_chacha::ChaCha8Rng;

use crate::errors::{Result, RudepError};
use crate::feature;
use crate::perceptron::{self, Perceptron};

/// A sentence paired with its gold tags, the tagger's training unit.
pub type TaggedSentence = (Vec<String>, Vec<String>);

/// Describes a Universal Dependencies coarse tag in plain words.
#[must_use]
pub fn describe_tag(tag: &str) -> Option<&'static str> {
    match tag {
        "ADJ" => Some("adjective"),
        "ADP" => Some("adposition"),
        "ADV" => Some("adverb"),
        "AUX" => Some("auxiliary verb"),
        "CONJ" => Some("coordinating conjunction"),
        "DET" => Some("determiner"),
        "INTJ" => Some("interjection"),
        "NOUN" => Some("noun"),
        "NUM" => Some("numeral"),
        "PART" => Some("particle"),
        "PRON" => Some("pronoun"),
        "PROPN" => Some("proper noun"),
        "PUNCT" => Some("punctuation"),
        "SCONJ" => Some("subordinating conjunction"),
        "SYM" => Some("symbol"),
        "VERB" => Some("verb"),
        "X" => Some("other"),
        _ => None,
    }
}

/// A greedy sequential part-of-speech tagger.
///
/// Unambiguous frequent words are tagged straight from a dictionary built at
/// training time; everything else goes through the perceptron. Tagging never
/// fails and leaves the model untouched.
pub struct Tagger {
    classes: Vec<String>,
    tag_dict: HashMap<String, String>,
    model: Perceptron,
}

impl Tagger {
    /// Tags a sentence. An empty sentence yields an empty tag sequence.
    ///
    /// The dictionary shortcut looks up the *unnormalized* word; the feature
    /// context uses normalized words and the two previously predicted tags.
    #[must_use]
    pub fn tag<S: AsRef<str>>(&self, words: &[S]) -> Vec<String> {
        let context = feature::tagger_context(words);
        let mut prev = feature::START[0].to_string();
        let mut prev2 = feature::START[1].to_string();
        let mut tags = Vec::with_capacity(words.len());
        for (i, word) in words.iter().enumerate() {
            let word = word.as_ref();
            let tag = match self.tag_dict.get(word) {
                Some(tag) => tag.clone(),
                None => {
                    let features = feature::tagger_features(i, word, &context, &prev, &prev2);
                    let class = self.model.predict(&features);
                    self.classes.get(class).cloned().unwrap_or_default()
                }
            };
            prev2 = mem::replace(&mut prev, tag.clone());
            tags.push(tag);
        }
        tags
    }

    /// The tag inventory in its fixed class order.
    #[inline(always)]
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Writes the model (classes, dictionary, weights) to a writer.
    ///
    /// # Errors
    ///
    /// [`RudepError::Model`] when encoding fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        bincode::encode_into_std_write(self, writer, bincode::config::standard())
            .map_err(|_| RudepError::model("failed to write tagger model"))?;
        Ok(())
    }

    /// Reads a model from a reader, validating magic, version, and kind.
    ///
    /// # Errors
    ///
    /// [`RudepError::Model`] on any mismatch or corruption.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        bincode::decode_from_std_read(reader, bincode::config::standard())
            .map_err(perceptron::model_error)
    }

    /// Saves the model to a file.
    ///
    /// # Errors
    ///
    /// [`RudepError::Io`] on file errors, [`RudepError::Model`] on encoding
    /// failure.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        self.write_to(&mut file)
    }

    /// Loads a model from a file.
    ///
    /// # Errors
    ///
    /// [`RudepError::Io`] on file errors, [`RudepError::Model`] on a bad or
    /// mismatched model file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = File::open(path)?;
        Self::read_from(&mut file)
    }
}

impl Encode for Tagger {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        perceptron::encode_header(encoder, perceptron::KIND_TAGGER)?;
        let mut dictionary: Vec<(&str, &str)> = self
            .tag_dict
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        dictionary.sort_unstable_by_key(|&(k, _)| k);
        Encode::encode(&self.classes, encoder)?;
        Encode::encode(&dictionary, encoder)?;
        Encode::encode(&self.model, encoder)
    }
}

impl<Context> Decode<Context> for Tagger {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        perceptron::decode_header(decoder, perceptron::KIND_TAGGER)?;
        let classes: Vec<String> = Decode::decode(decoder)?;
        let dictionary: Vec<(String, String)> = Decode::decode(decoder)?;
        let model: Perceptron = Decode::decode(decoder)?;
        if model.n_classes() != classes.len() {
            return Err(DecodeError::Other("tagger model has a wrong class count"));
        }
        for (_, tag) in &dictionary {
            if !classes.contains(tag) {
                return Err(DecodeError::Other(
                    "tagger dictionary names a tag outside the class list",
                ));
            }
        }
        Ok(Self {
            classes,
            tag_dict: dictionary.into_iter().collect(),
            model,
        })
    }
}

/// A word must occur at least this often to enter the tag dictionary.
#[cfg(feature = "train")]
const FREQ_THRESHOLD: usize = 20;

/// The dominant tag must cover at least this share of a word's occurrences.
#[cfg(feature = "train")]
const AMBIGUITY_THRESHOLD: f64 = 0.97;

/// Configures and runs tagger training.
#[cfg(feature = "train")]
pub struct TaggerTrainer {
    iterations: u64,
    seed: u64,
}

#[cfg(feature = "train")]
impl Default for TaggerTrainer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "train")]
impl TaggerTrainer {
    /// Creates a trainer with the default epoch count and seed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            iterations: 5,
            seed: 1,
        }
    }

    /// Sets the number of epochs.
    ///
    /// # Errors
    ///
    /// [`RudepError::InvalidArgument`] when `iterations` is 0.
    pub fn iterations(mut self, iterations: u64) -> Result<Self> {
        if iterations == 0 {
            return Err(RudepError::invalid_argument("iterations must not be 0"));
        }
        self.iterations = iterations;
        Ok(self)
    }

    /// Sets the shuffle seed; a fixed seed makes training reproducible.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Trains a tagger and returns it frozen (averaged).
    ///
    /// # Errors
    ///
    /// [`RudepError::InvalidArgument`] when a sentence pairs differing word
    /// and tag counts.
    pub fn train(&self, sentences: &[TaggedSentence]) -> Result<Tagger> {
        for (words, tags) in sentences {
            if words.len() != tags.len() {
                return Err(RudepError::invalid_argument(
                    "words and tags must have equal length",
                ));
            }
        }

        let (classes, tag_dict) = Self::make_tag_dict(sentences);
        let class_index: HashMap<&str, usize> = classes
            .iter()
            .enumerate()
            .map(|(i, tag)| (tag.as_str(), i))
            .collect();
        let mut model = Perceptron::new(classes.len());

        let mut order: Vec<usize> = (0..sentences.len()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        for epoch in 0..self.iterations {
            order.shuffle(&mut rng);
            let mut correct = 0usize;
            let mut total = 0usize;
            for &idx in &order {
                let (words, tags) = &sentences[idx];
                let (c, t) =
                    Self::train_one(&mut model, &classes, &class_index, &tag_dict, words, tags)?;
                correct += c;
                total += t;
            }
            if total > 0 {
                debug!(
                    "iter {epoch}: {correct}/{total}={:.3}",
                    correct as f64 / total as f64
                );
            }
        }
        drop(class_index);
        info!("averaging weights");
        model.average();

        Ok(Tagger {
            classes,
            tag_dict,
            model,
        })
    }

    /// One pass over one sentence; the *predicted* tags feed the context of
    /// the following words, as they will at inference time.
    fn train_one(
        model: &mut Perceptron,
        classes: &[String],
        class_index: &HashMap<&str, usize>,
        tag_dict: &HashMap<String, String>,
        words: &[String],
        tags: &[String],
    ) -> Result<(usize, usize)> {
        let context = feature::tagger_context(words);
        let mut prev = feature::START[0].to_string();
        let mut prev2 = feature::START[1].to_string();
        let mut correct = 0;
        for (i, word) in words.iter().enumerate() {
            let guess_tag = match tag_dict.get(word) {
                Some(tag) => tag.clone(),
                None => {
                    let features = feature::tagger_features(i, word, &context, &prev, &prev2);
                    let guess = model.predict(&features);
                    if let Some(&truth) = class_index.get(tags[i].as_str()) {
                        model.update(truth, guess, &features)?;
                    }
                    classes.get(guess).cloned().unwrap_or_default()
                }
            };
            if guess_tag == tags[i] {
                correct += 1;
            }
            prev2 = mem::replace(&mut prev, guess_tag);
        }
        Ok((correct, words.len()))
    }

    /// Collects the sorted tag inventory and the unambiguous-word dictionary.
    ///
    /// Only words seen at least [`FREQ_THRESHOLD`] times whose most frequent
    /// tag covers at least [`AMBIGUITY_THRESHOLD`] of the occurrences are
    /// added.
    fn make_tag_dict(
        sentences: &[TaggedSentence],
    ) -> (Vec<String>, HashMap<String, String>) {
        let mut counts: HashMap<&str, HashMap<&str, usize>> = HashMap::new();
        let mut class_set: std::collections::BTreeSet<&str> = std::collections::BTreeSet::new();
        for (words, tags) in sentences {
            for (word, tag) in words.iter().zip(tags) {
                *counts
                    .entry(word.as_str())
                    .or_default()
                    .entry(tag.as_str())
                    .or_insert(0) += 1;
                class_set.insert(tag.as_str());
            }
        }

        let mut tag_dict = HashMap::new();
        for (word, tag_freqs) in &counts {
            let total: usize = tag_freqs.values().sum();
            // Deterministic mode: highest count, lexicographically smallest
            // tag on ties.
            let Some((mode_tag, mode)) = tag_freqs
                .iter()
                .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            else {
                continue;
            };
            if total >= FREQ_THRESHOLD && *mode as f64 / total as f64 >= AMBIGUITY_THRESHOLD {
                tag_dict.insert(word.to_string(), mode_tag.to_string());
            }
        }

        let classes = class_set.into_iter().map(str::to_string).collect();
        (classes, tag_dict)
    }
}
