//! Greedy transition-based dependency parsing.
//!
//! Sentences are decoded in a padded coordinate space: position 0 is a start
//! pad, positions 1..=k are the words, and position k+1 is a trailing root
//! slot. A word attached to the root slot comes out of decoding with head 0.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use bincode::{
    de::Decoder,
    enc::Encoder,
    error::{DecodeError, EncodeError},
    Decode, Encode,
};
#[cfg(feature = "train")]
use hashbrown::HashSet;
#[cfg(feature = "train")]
use log::{debug, info, warn};
#[cfg(feature = "train")]
use rand::seq::SliceRandom;
#[cfg(feature = "train")]
use rand::SeedableRng;
#[cfg(feature = "train")]
use rand_chacha::ChaCha8Rng;

use crate::errors::{Result, RudepError};
use crate::feature;
use crate::graph::DependencyGraph;
use crate::perceptron::{self, Perceptron};
use crate::tagger::Tagger;

/// Word standing in for the start pad in feature windows.
const START_TOKEN: &str = "<start>";

/// Word standing in for the trailing root slot in feature windows.
const ROOT_TOKEN: &str = "ROOT";

/// The three transitions of the parser.
///
/// `Left` attaches the popped stack top to the *current front of the buffer*
/// rather than to a second stack item; together with the absence of a
/// `Reduce` move this is the transition system the models are trained for,
/// and it must not be "corrected" towards a textbook arc-standard system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Move {
    /// Push the front of the buffer onto the stack.
    Shift,
    /// Attach the popped stack top to the item below it.
    Right,
    /// Attach the popped stack top to the front of the buffer.
    Left,
}

impl Move {
    /// All moves in their fixed class order.
    pub const ALL: [Self; 3] = [Self::Shift, Self::Right, Self::Left];

    /// The class index of this move in the parser's model.
    #[inline(always)]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Shift => 0,
            Self::Right => 1,
            Self::Left => 2,
        }
    }
}

/// Transient decoding state over one padded sentence.
pub(crate) struct ParserState {
    n: usize,
    stack: Vec<usize>,
    buffer_ptr: usize,
    heads: Vec<Option<usize>>,
    lefts: Vec<Vec<usize>>,
    rights: Vec<Vec<usize>>,
}

impl ParserState {
    /// `n` is the padded length: word count plus the two pads.
    fn new(n: usize) -> Self {
        Self {
            n,
            stack: vec![1],
            buffer_ptr: 2,
            heads: vec![None; n],
            lefts: vec![Vec::new(); n + 1],
            rights: vec![Vec::new(); n + 1],
        }
    }

    fn is_terminal(&self) -> bool {
        self.stack.is_empty() && self.buffer_ptr + 1 >= self.n
    }

    fn valid_moves(&self) -> Vec<Move> {
        let mut moves = Vec::with_capacity(3);
        if self.buffer_ptr + 1 < self.n {
            moves.push(Move::Shift);
        }
        if self.stack.len() >= 2 {
            moves.push(Move::Right);
        }
        if !self.stack.is_empty() {
            moves.push(Move::Left);
        }
        moves
    }

    fn add(&mut self, head: usize, child: usize) {
        self.heads[child] = Some(head);
        if child < head {
            self.lefts[head].push(child);
        } else {
            self.rights[head].push(child);
        }
    }

    /// Applies a move that [`ParserState::valid_moves`] offered.
    fn apply(&mut self, mv: Move) {
        match mv {
            Move::Shift => {
                self.stack.push(self.buffer_ptr);
                self.buffer_ptr += 1;
            }
            Move::Right => {
                let Some(child) = self.stack.pop() else {
                    return;
                };
                let Some(&head) = self.stack.last() else {
                    return;
                };
                self.add(head, child);
            }
            Move::Left => {
                let Some(child) = self.stack.pop() else {
                    return;
                };
                self.add(self.buffer_ptr, child);
            }
        }
    }

    fn features(&self, words: &[String], tags: &[String]) -> Vec<String> {
        feature::parser_features(
            words,
            tags,
            self.buffer_ptr,
            &self.stack,
            &self.lefts,
            &self.rights,
        )
    }
}

/// The highest-scoring move among `candidates`, ties going to the earliest.
fn best_move(candidates: &[Move], scores: &[f64]) -> Move {
    let mut best = candidates[0];
    let mut best_score = f64::NEG_INFINITY;
    for &mv in candidates {
        if scores[mv.index()] > best_score {
            best_score = scores[mv.index()];
            best = mv;
        }
    }
    best
}

/// The valid moves that do not foreclose any still-needed gold arc.
///
/// An empty result means the gold tree is non-projective for this transition
/// system.
fn gold_moves(state: &ParserState, gold: &[Option<usize>]) -> Vec<Move> {
    fn deps_between(
        gold: &[Option<usize>],
        target: usize,
        others: impl IntoIterator<Item = usize>,
    ) -> bool {
        others
            .into_iter()
            .any(|word| gold[word] == Some(target) || gold[target] == Some(word))
    }

    let n0 = state.buffer_ptr;
    let n = state.n;
    let valid = state.valid_moves();

    let Some(&s0) = state.stack.last() else {
        return vec![Move::Shift];
    };
    if valid.contains(&Move::Shift) && gold[n0] == Some(s0) {
        return vec![Move::Shift];
    }
    if gold[s0] == Some(n0) {
        return vec![Move::Left];
    }

    let mut costly = [false; 3];
    for mv in Move::ALL {
        if !valid.contains(&mv) {
            costly[mv.index()] = true;
        }
    }
    // If the word behind s0 is its gold head, popping to the buffer front
    // loses the arc.
    if state.stack.len() >= 2 && gold[s0] == Some(state.stack[state.stack.len() - 2]) {
        costly[Move::Left.index()] = true;
    }
    // Pushing n0 loses any gold arc between n0 and the stack.
    if !costly[Move::Shift.index()] && deps_between(gold, n0, state.stack.iter().copied()) {
        costly[Move::Shift.index()] = true;
    }
    // Popping s0 loses any gold arc between s0 and the rest of the buffer.
    if deps_between(gold, s0, n0 + 1..n.saturating_sub(1)) {
        costly[Move::Left.index()] = true;
        costly[Move::Right.index()] = true;
    }

    Move::ALL
        .into_iter()
        .filter(|mv| !costly[mv.index()])
        .collect()
}

fn pad(tokens: &[String]) -> Vec<String> {
    let mut padded = Vec::with_capacity(tokens.len() + 2);
    padded.push(START_TOKEN.to_string());
    padded.extend(tokens.iter().cloned());
    padded.push(ROOT_TOKEN.to_string());
    padded
}

/// A greedy shift/reduce-style dependency parser.
///
/// A fresh parser decodes with zero weights (producing well-formed but
/// arbitrary trees); [`ParserTrainer`] produces trained, frozen parsers.
pub struct Parser {
    model: Perceptron,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    /// Creates an untrained parser.
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: Perceptron::new(Move::ALL.len()),
        }
    }

    /// Parses a tagged sentence into a dependency tree.
    ///
    /// Decoding is total: it terminates after at most `2n − 1` transitions
    /// and always yields a tree in which every word has exactly one head.
    ///
    /// # Errors
    ///
    /// [`RudepError::InvalidArgument`] when `words` and `tags` differ in
    /// length; never fails on any well-formed token input.
    pub fn parse<S, T>(&self, words: &[S], tags: &[T]) -> Result<DependencyGraph>
    where
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let mut graph = DependencyGraph::from_tokens(words, tags)?;
        let k = words.len();
        if k == 0 {
            return Ok(graph);
        }

        let words: Vec<String> = words.iter().map(|w| w.as_ref().to_string()).collect();
        let tags: Vec<String> = tags.iter().map(|t| t.as_ref().to_string()).collect();
        let padded_words = pad(&words);
        let padded_tags = pad(&tags);
        let n = k + 2;

        let mut state = ParserState::new(n);
        while !state.is_terminal() {
            let features = state.features(&padded_words, &padded_tags);
            let scores = self.model.scores(&features);
            let guess = best_move(&state.valid_moves(), &scores);
            state.apply(guess);
        }

        for child in 1..=k {
            if let Some(head) = state.heads[child] {
                let head = if head == n - 1 { 0 } else { head };
                graph.update_dependency(head, child)?;
            }
        }
        Ok(graph)
    }

    /// Tags a sentence with the given tagger, then parses it.
    ///
    /// # Errors
    ///
    /// See [`Parser::parse`].
    pub fn parse_with_tagger<S: AsRef<str>>(
        &self,
        tagger: &Tagger,
        words: &[S],
    ) -> Result<(Vec<String>, DependencyGraph)> {
        let tags = tagger.tag(words);
        let graph = self.parse(words, &tags)?;
        Ok((tags, graph))
    }

    /// Writes the model to a writer.
    ///
    /// # Errors
    ///
    /// [`RudepError::Model`] when encoding fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        bincode::encode_into_std_write(self, writer, bincode::config::standard())
            .map_err(|_| RudepError::model("failed to write parser model"))?;
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

impl Encode for Parser {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        perceptron::encode_header(encoder, perceptron::KIND_PARSER)?;
        Encode::encode(&self.model, encoder)
    }
}

impl<Context> Decode<Context> for Parser {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        perceptron::decode_header(decoder, perceptron::KIND_PARSER)?;
        let model: Perceptron = Decode::decode(decoder)?;
        if model.n_classes() != Move::ALL.len() {
            return Err(DecodeError::Other("parser model has a wrong move count"));
        }
        Ok(Self { model })
    }
}

/// Summary of a parser training run.
#[cfg(feature = "train")]
#[derive(Clone, Debug, Default)]
pub struct TrainReport {
    /// Number of epochs run.
    pub epochs: u64,
    /// Distinct sentences skipped as non-projective.
    pub skipped_non_projective: usize,
    /// Head accuracy over the final epoch's training decisions.
    pub uas: f64,
    /// Counts of (oracle move, guessed move) pairs seen during training,
    /// indexed by [`Move::index`].
    pub confusion: [[u64; 3]; 3],
}

/// One gold sentence in padded coordinates.
#[cfg(feature = "train")]
struct Instance {
    words: Vec<String>,
    padded_words: Vec<String>,
    padded_tags: Vec<String>,
    /// Gold head per padded position; the graph root maps to the root slot.
    gold_heads: Vec<Option<usize>>,
}

#[cfg(feature = "train")]
impl Instance {
    fn from_graph(graph: &DependencyGraph) -> Self {
        let (words, tags) = graph.pos_sequence();
        let k = words.len();
        let mut gold_heads = vec![None; k + 2];
        for node in &graph.nodes()[1..] {
            gold_heads[node.id] = node.head.map(|h| if h == 0 { k + 1 } else { h });
        }
        Self {
            padded_words: pad(&words),
            padded_tags: pad(&tags),
            words,
            gold_heads,
        }
    }
}

/// Configures and runs parser training.
#[cfg(feature = "train")]
pub struct ParserTrainer {
    iterations: u64,
    seed: u64,
}

#[cfg(feature = "train")]
impl Default for ParserTrainer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "train")]
impl ParserTrainer {
    /// Creates a trainer with the default epoch count and seed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            iterations: 15,
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

    /// Trains a parser on gold trees and returns it frozen (averaged).
    ///
    /// Non-projective sentences are skipped and counted, never fatal.
    ///
    /// # Errors
    ///
    /// Only internal errors surface; non-projectivity is handled per
    /// sentence.
    pub fn train(&self, gold: &[DependencyGraph]) -> Result<(Parser, TrainReport)> {
        let mut model = Perceptron::new(Move::ALL.len());
        let mut report = TrainReport {
            epochs: self.iterations,
            ..TrainReport::default()
        };

        let instances: Vec<Instance> = gold.iter().map(Instance::from_graph).collect();
        let mut order: Vec<usize> = (0..instances.len())
            .filter(|&i| !instances[i].words.is_empty())
            .collect();
        let mut skipped: HashSet<usize> = HashSet::new();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        for epoch in 0..self.iterations {
            order.shuffle(&mut rng);
            let mut correct = 0usize;
            let mut total = 0usize;
            for &idx in &order {
                if skipped.contains(&idx) {
                    continue;
                }
                match Self::train_one(&mut model, &instances[idx], &mut report.confusion) {
                    Ok((c, t)) => {
                        correct += c;
                        total += t;
                    }
                    Err(RudepError::NonProjective { sentence }) => {
                        warn!("skipping non-projective sentence: {sentence}");
                        skipped.insert(idx);
                    }
                    Err(e) => return Err(e),
                }
            }
            if total > 0 {
                report.uas = correct as f64 / total as f64;
            }
            debug!("iter {epoch}: {correct}/{total}={:.3}", report.uas);
        }
        info!("averaging weights");
        model.average();

        report.skipped_non_projective = skipped.len();
        Ok((Parser { model }, report))
    }

    /// Replays one sentence, updating the model at every state.
    ///
    /// The *guess* advances the state, so training explores the same state
    /// distribution greedy decoding will see.
    fn train_one(
        model: &mut Perceptron,
        instance: &Instance,
        confusion: &mut [[u64; 3]; 3],
    ) -> Result<(usize, usize)> {
        let n = instance.padded_words.len();
        let mut state = ParserState::new(n);
        while !state.is_terminal() {
            let features = state.features(&instance.padded_words, &instance.padded_tags);
            let scores = model.scores(&features);
            let golds = gold_moves(&state, &instance.gold_heads);
            if golds.is_empty() {
                return Err(RudepError::non_projective(instance.words.join(" ")));
            }
            let guess = best_move(&state.valid_moves(), &scores);
            let truth = best_move(&golds, &scores);
            model.update(truth.index(), guess.index(), &features)?;
            confusion[truth.index()][guess.index()] += 1;
            state.apply(guess);
        }

        let k = instance.words.len();
        let mut correct = 0;
        for position in 1..=k {
            if state.heads[position] == instance.gold_heads[position] {
                correct += 1;
            }
        }
        Ok((correct, k))
    }
}
