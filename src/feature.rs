//! Feature extraction for the tagger and the parser.
//!
//! Everything here is a pure function from a decoding context to a bag of
//! named boolean features. The names themselves are opaque to the rest of the
//! crate; changing any template invalidates previously trained models.

/// Pseudo-tokens padding the left context of a sentence.
pub(crate) const START: [&str; 2] = ["-START-", "-START2-"];

/// Pseudo-tokens padding the right context of a sentence.
pub(crate) const END: [&str; 2] = ["-END-", "-END2-"];

/// Collapses rare word shapes before they are used as context features.
///
/// Hyphenated words (hyphen not in first position) become `!HYPHEN`, 4-digit
/// numbers `!YEAR`, digit-initial words `!DIGITS`; everything else is
/// lowercased.
pub(crate) fn normalize(word: &str) -> String {
    if word.contains('-') && !word.starts_with('-') {
        "!HYPHEN".to_string()
    } else if word.chars().count() == 4 && word.chars().all(|c| c.is_ascii_digit()) {
        "!YEAR".to_string()
    } else if word.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        "!DIGITS".to_string()
    } else {
        word.to_lowercase()
    }
}

/// The normalized context window for a sentence: two START pads, the
/// normalized words, two END pads.
pub(crate) fn tagger_context<S: AsRef<str>>(words: &[S]) -> Vec<String> {
    let mut context = Vec::with_capacity(words.len() + 4);
    context.extend(START.iter().map(|s| s.to_string()));
    context.extend(words.iter().map(|w| normalize(w.as_ref())));
    context.extend(END.iter().map(|s| s.to_string()));
    context
}

/// Up to the last `n` characters of a word.
fn suffix(word: &str, n: usize) -> &str {
    let start = word
        .char_indices()
        .rev()
        .nth(n - 1)
        .map_or(0, |(i, _)| i);
    &word[start..]
}

/// The first character of a word.
fn prefix(word: &str) -> &str {
    word.char_indices().nth(1).map_or(word, |(i, _)| &word[..i])
}

fn add(features: &mut Vec<String>, name: &str, args: &[&str]) {
    let mut s = String::from(name);
    for arg in args {
        s.push(' ');
        s.push_str(arg);
    }
    features.push(s);
}

/// Features for tagging the word at sentence position `i` (0-based).
///
/// `context` comes from [`tagger_context`]; `prev`/`prev2` are the previous
/// two *predicted* tags, seeded with the START pseudo-tags.
pub(crate) fn tagger_features(
    i: usize,
    word: &str,
    context: &[String],
    prev: &str,
    prev2: &str,
) -> Vec<String> {
    let i = i + START.len();
    let mut features = Vec::with_capacity(15);
    add(&mut features, "bias", &[]);
    add(&mut features, "i suffix", &[suffix(word, 3)]);
    add(&mut features, "i pref1", &[prefix(word)]);
    add(&mut features, "i-1 tag", &[prev]);
    add(&mut features, "i-2 tag", &[prev2]);
    add(&mut features, "i tag+i-2 tag", &[prev, prev2]);
    add(&mut features, "i word", &[&context[i]]);
    add(&mut features, "i-1 tag+i word", &[prev, &context[i]]);
    add(&mut features, "i-1 word", &[&context[i - 1]]);
    add(&mut features, "i-1 suffix", &[suffix(&context[i - 1], 3)]);
    add(&mut features, "i-2 word", &[&context[i - 2]]);
    add(&mut features, "i+1 word", &[&context[i + 1]]);
    add(&mut features, "i+1 suffix", &[suffix(&context[i + 1], 3)]);
    add(&mut features, "i+2 word", &[&context[i + 2]]);
    features
}

/// Word or tag identity of the top three stack items, topmost first.
fn stack_context<'a>(stack: &[usize], data: &'a [String]) -> [&'a str; 3] {
    let mut out = [""; 3];
    for (slot, position) in out.iter_mut().zip(stack.iter().rev()) {
        *slot = &data[*position];
    }
    out
}

/// Word or tag identity of the next three buffer items, front first.
fn buffer_context(n0: usize, data: &[String]) -> [&str; 3] {
    let n = data.len();
    let mut out = [""; 3];
    for (k, slot) in out.iter_mut().enumerate() {
        if n0 + k < n {
            *slot = &data[n0 + k];
        }
    }
    out
}

/// Valency and the identity of the two most recently attached children on
/// one side of a position.
fn parse_context<'a>(
    position: Option<usize>,
    deps: &[Vec<usize>],
    data: &'a [String],
) -> (usize, &'a str, &'a str) {
    let Some(position) = position else {
        return (0, "", "");
    };
    let deps = &deps[position];
    match deps.len() {
        0 => (0, "", ""),
        1 => (1, &data[deps[0]], ""),
        v => (v, &data[deps[v - 1]], &data[deps[v - 2]]),
    }
}

/// Features for choosing the next transition.
///
/// `words`/`tags` are the padded arrays (start pad at position 0, root slot
/// last); `n0` is the buffer pointer; `lefts`/`rights` record, per position,
/// the already-attached children on each side in attachment order.
pub(crate) fn parser_features(
    words: &[String],
    tags: &[String],
    n0: usize,
    stack: &[usize],
    lefts: &[Vec<usize>],
    rights: &[Vec<usize>],
) -> Vec<String> {
    let s0 = stack.last().copied();

    let [ws0, ws1, ws2] = stack_context(stack, words);
    let [ts0, ts1, ts2] = stack_context(stack, tags);

    let [wn0, wn1, wn2] = buffer_context(n0, words);
    let [tn0, tn1, tn2] = buffer_context(n0, tags);

    let (vn0b, wn0b1, wn0b2) = parse_context(Some(n0), lefts, words);
    let (_, tn0b1, tn0b2) = parse_context(Some(n0), lefts, tags);

    let (vs0b, ws0b1, ws0b2) = parse_context(s0, lefts, words);
    let (_, ts0b1, ts0b2) = parse_context(s0, lefts, tags);

    let (vs0f, ws0f1, ws0f2) = parse_context(s0, rights, words);
    let (_, ts0f1, ts0f2) = parse_context(s0, rights, tags);

    // Stack-to-buffer distance, capped at 5.
    let dist = match s0 {
        Some(s0) => (n0 - s0).min(5),
        None => (n0 + 1).min(5),
    };

    let mut features = Vec::with_capacity(48);
    features.push("bias".to_string());

    for w in [
        wn0, wn1, wn2, ws0, ws1, ws2, wn0b1, wn0b2, ws0b1, ws0b2, ws0f1, ws0f2,
    ] {
        if !w.is_empty() {
            features.push(format!("w={w}"));
        }
    }
    for t in [
        tn0, tn1, tn2, ts0, ts1, ts2, tn0b1, tn0b2, ts0b1, ts0b2, ts0f1, ts0f2,
    ] {
        if !t.is_empty() {
            features.push(format!("t={t}"));
        }
    }

    for (i, (w, t)) in [(wn0, tn0), (wn1, tn1), (wn2, tn2), (ws0, ts0)]
        .into_iter()
        .enumerate()
    {
        if !w.is_empty() || !t.is_empty() {
            features.push(format!("{i} w={w}, t={t}"));
        }
    }

    features.push(format!("s0w={ws0} n0w={wn0}"));
    features.push(format!("wn0tn0-ws0 {wn0}/{tn0} {ws0}"));
    features.push(format!("wn0tn0-ts0 {wn0}/{tn0} {ts0}"));
    features.push(format!("ws0ts0-wn0 {ws0}/{ts0} {wn0}"));
    features.push(format!("ws0-ts0 tn0 {ws0}/{ts0} {tn0}"));
    features.push(format!("wt-wt {ws0}/{ts0} {wn0}/{tn0}"));
    features.push(format!("tt s0={ts0} n0={tn0}"));
    features.push(format!("tt n0={tn0} n1={tn1}"));

    let trigrams = [
        (tn0, tn1, tn2),
        (ts0, tn0, tn1),
        (ts0, ts1, tn0),
        (ts0, ts0f1, tn0),
        (ts0, ts0f1, tn0),
        (ts0, tn0, tn0b1),
        (ts0, ts0b1, ts0b2),
        (ts0, ts0f1, ts0f2),
        (tn0, tn0b1, tn0b2),
        (ts0, ts1, ts1),
    ];
    for (i, (t1, t2, t3)) in trigrams.into_iter().enumerate() {
        if !t1.is_empty() || !t2.is_empty() || !t3.is_empty() {
            features.push(format!("ttt-{i} {t1} {t2} {t3}"));
        }
    }

    let tn0ts0 = format!("t{tn0}{ts0}");
    let wn0ws0 = format!("w{wn0}{ws0}");
    let valency_and_distance = [
        (ws0, vs0f),
        (ws0, vs0b),
        (wn0, vn0b),
        (ts0, vs0f),
        (ts0, vs0b),
        (tn0, vn0b),
        (ws0, dist),
        (wn0, dist),
        (ts0, dist),
        (tn0, dist),
        (tn0ts0.as_str(), dist),
        (wn0ws0.as_str(), dist),
    ];
    for (i, (atom, count)) in valency_and_distance.into_iter().enumerate() {
        if !atom.is_empty() || count != 0 {
            features.push(format!("val/d-{i} {atom} {count}"));
        }
    }

    features
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_shapes() {
        assert_eq!(normalize("well-known"), "!HYPHEN");
        assert_eq!(normalize("-dash"), "-dash");
        assert_eq!(normalize("1984"), "!YEAR");
        assert_eq!(normalize("12"), "!DIGITS");
        assert_eq!(normalize("Dog"), "dog");
    }

    #[test]
    fn test_suffix_and_prefix_respect_char_boundaries() {
        assert_eq!(suffix("walking", 3), "ing");
        assert_eq!(suffix("go", 3), "go");
        assert_eq!(suffix("héllo", 3), "llo");
        assert_eq!(prefix("dog"), "d");
        assert_eq!(prefix("über"), "ü");
        assert_eq!(prefix(""), "");
    }

    #[test]
    fn test_tagger_context_pads_both_sides() {
        let context = tagger_context(&["The", "1984", "dog"]);
        assert_eq!(
            context,
            vec!["-START-", "-START2-", "the", "!YEAR", "dog", "-END-", "-END2-"]
        );
    }

    #[test]
    fn test_tagger_features_include_window() {
        let words = ["The", "dog", "barks"];
        let context = tagger_context(&words);
        let features = tagger_features(1, "dog", &context, "DET", "-START2-");
        assert!(features.contains(&"bias".to_string()));
        assert!(features.contains(&"i word dog".to_string()));
        assert!(features.contains(&"i-1 tag DET".to_string()));
        assert!(features.contains(&"i+1 word barks".to_string()));
        assert!(features.contains(&"i suffix dog".to_string()));
    }

    #[test]
    fn test_parser_features_read_stack_and_buffer() {
        // "<start> Dog sees cat ROOT", stack holds position 1, buffer at 2.
        let words: Vec<String> = ["<start>", "Dog", "sees", "cat", "ROOT"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let tags: Vec<String> = ["<start>", "NOUN", "VERB", "NOUN", "ROOT"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let lefts = vec![vec![]; words.len() + 1];
        let rights = vec![vec![]; words.len() + 1];
        let features = parser_features(&words, &tags, 2, &[1], &lefts, &rights);
        assert!(features.contains(&"w=Dog".to_string()));
        assert!(features.contains(&"w=sees".to_string()));
        assert!(features.contains(&"t=VERB".to_string()));
        assert!(features.contains(&"tt s0=NOUN n0=VERB".to_string()));
        // Distance from stack top 1 to buffer front 2.
        assert!(features.contains(&"val/d-6 Dog 1".to_string()));
    }

    #[test]
    fn test_parser_features_empty_stack() {
        let words: Vec<String> = ["<start>", "Hi", "ROOT"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let tags: Vec<String> = ["<start>", "INTJ", "ROOT"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let lefts = vec![vec![]; words.len() + 1];
        let rights = vec![vec![]; words.len() + 1];
        // Must not panic and must not claim any stack context.
        let features = parser_features(&words, &tags, 2, &[], &lefts, &rights);
        assert!(!features.iter().any(|f| f.starts_with("w=<start>")));
    }
}
