//! Sequence edit distance with per-operation penalties.

/// One step of an alignment between a source and a target sequence.
///
/// `(None, None)` is a match, `(Some(s), Some(t))` a substitution,
/// `(None, Some(t))` an insertion, and `(Some(s), None)` a deletion.
pub type EditOp<'a, T> = (Option<&'a T>, Option<&'a T>);

/// Minimum-cost edit script between two sequences.
///
/// The dynamic-programming table is computed on construction; distance,
/// best path, and operation counts read it without further work.
pub struct WordDistance<'a, T> {
    source: &'a [T],
    target: &'a [T],
    insert: f64,
    substitute: f64,
    delete: f64,
    table: Vec<Vec<f64>>,
}

impl<'a, T: PartialEq> WordDistance<'a, T> {
    /// Uses the default penalties `(1, 2, 1)` for insertion, substitution,
    /// and deletion.
    #[must_use]
    pub fn new(source: &'a [T], target: &'a [T]) -> Self {
        Self::with_penalties(source, target, (1.0, 2.0, 1.0))
    }

    /// `penalties` is `(insert, substitute, delete)`; insertion consumes a
    /// target item, deletion a source item.
    #[must_use]
    pub fn with_penalties(source: &'a [T], target: &'a [T], penalties: (f64, f64, f64)) -> Self {
        let (insert, substitute, delete) = penalties;
        let n = source.len();
        let m = target.len();
        let mut table = vec![vec![0.0; m + 1]; n + 1];
        for i in 1..=n {
            table[i][0] = table[i - 1][0] + delete;
        }
        for j in 1..=m {
            table[0][j] = table[0][j - 1] + insert;
        }
        for i in 1..=n {
            for j in 1..=m {
                let deletion = table[i - 1][j] + delete;
                let insertion = table[i][j - 1] + insert;
                let substitution = if source[i - 1] == target[j - 1] {
                    table[i - 1][j - 1]
                } else {
                    table[i - 1][j - 1] + substitute
                };
                table[i][j] = substitution.min(insertion).min(deletion);
            }
        }
        Self {
            source,
            target,
            insert,
            substitute,
            delete,
            table,
        }
    }

    /// The minimum total edit cost between the sequences.
    #[must_use]
    pub fn distance(&self) -> f64 {
        self.table[self.source.len()][self.target.len()]
    }

    /// A minimum-cost alignment, source-order first to last.
    ///
    /// Substitution is preferred over insertion, and insertion over
    /// deletion, when costs tie.
    #[must_use]
    pub fn best_path(&self) -> Vec<EditOp<'a, T>> {
        let mut i = self.source.len();
        let mut j = self.target.len();
        let mut path = Vec::with_capacity(i.max(j));
        while i > 0 || j > 0 {
            if i == 0 {
                path.push((None, Some(&self.target[j - 1])));
                j -= 1;
                continue;
            }
            if j == 0 {
                path.push((Some(&self.source[i - 1]), None));
                i -= 1;
                continue;
            }
            let diagonal = self.table[i - 1][j - 1];
            let insertion = self.table[i][j - 1];
            let deletion = self.table[i - 1][j];
            if diagonal <= deletion && diagonal <= insertion {
                if self.source[i - 1] == self.target[j - 1] {
                    path.push((None, None));
                } else {
                    path.push((Some(&self.source[i - 1]), Some(&self.target[j - 1])));
                }
                i -= 1;
                j -= 1;
            } else if insertion <= deletion {
                path.push((None, Some(&self.target[j - 1])));
                j -= 1;
            } else {
                path.push((Some(&self.source[i - 1]), None));
                i -= 1;
            }
        }
        path.reverse();
        path
    }

    /// `(insertions, deletions, substitutions)` along the best path.
    #[must_use]
    pub fn ops_used(&self) -> (usize, usize, usize) {
        let mut insertions = 0;
        let mut deletions = 0;
        let mut substitutions = 0;
        for op in self.best_path() {
            match op {
                (None, Some(_)) => insertions += 1,
                (Some(_), None) => deletions += 1,
                (Some(_), Some(_)) => substitutions += 1,
                (None, None) => {}
            }
        }
        (insertions, deletions, substitutions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PENALTIES: (f64, f64, f64) = (1.0, 2.0, 1.0);

    #[test]
    fn test_distances() {
        let cases: &[(&[i32], &[i32], f64)] = &[
            (&[1, 1, 1], &[0, 0, 0], 6.0),
            (&[0, 1], &[0, 0, 0], 3.0),
            (&[1, 0, 0], &[0, 0, 0], 2.0),
            (&[0, 1, 0], &[0, 0, 0], 2.0),
            (&[0, 0, 1], &[0, 0, 0], 2.0),
        ];
        for &(source, target, expected) in cases {
            let wd = WordDistance::with_penalties(source, target, PENALTIES);
            assert!(
                (wd.distance() - expected).abs() < f64::EPSILON,
                "{source:?} -> {target:?}"
            );
        }
    }

    #[test]
    fn test_best_paths() {
        let zero = 0;
        let one = 1;

        let wd = WordDistance::with_penalties(&[0, 0], &[0, 0], PENALTIES);
        assert_eq!(wd.best_path(), vec![(None, None), (None, None)]);

        let wd = WordDistance::with_penalties(&[1], &[], PENALTIES);
        assert_eq!(wd.best_path(), vec![(Some(&one), None)]);

        let wd = WordDistance::with_penalties(&[], &[1], PENALTIES);
        assert_eq!(wd.best_path(), vec![(None, Some(&one))]);

        let wd = WordDistance::with_penalties(&[1, 1], &[0, 0], PENALTIES);
        assert_eq!(
            wd.best_path(),
            vec![(Some(&one), Some(&zero)), (Some(&one), Some(&zero))]
        );

        let wd = WordDistance::with_penalties(&[1], &[0], PENALTIES);
        assert_eq!(wd.best_path(), vec![(Some(&one), Some(&zero))]);
    }

    #[test]
    fn test_ops_used() {
        let wd = WordDistance::with_penalties(&[1, 0, 0], &[0, 0, 0], PENALTIES);
        assert_eq!(wd.ops_used(), (0, 0, 1));
        let wd = WordDistance::with_penalties(&[1, 1], &[], PENALTIES);
        assert_eq!(wd.ops_used(), (0, 2, 0));
        let wd = WordDistance::new(&["a", "b"], &["a", "b", "c"]);
        assert_eq!(wd.ops_used(), (1, 0, 0));
    }

    #[test]
    fn test_default_penalties_prefer_matches() {
        let wd = WordDistance::new(&["the", "dog"], &["the", "cat"]);
        assert!((wd.distance() - 2.0).abs() < f64::EPSILON);
        let path = wd.best_path();
        assert_eq!(path[0], (None, None));
    }
}
