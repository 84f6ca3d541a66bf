use lazy_static::lazy_static;
use regex::Regex;

use super::expr;

lazy_static! {
    static ref SHUFFLE_LOOP: Regex = Regex::new(
        r"(?s)for\s+([A-Za-z0-9_]+)\s*,\s*([A-Za-z0-9_]+)\s+in\s+ipairs\s*\(\s*\{(.*?)\}\s*\)\s*do"
    )
    .expect("shuffle loop pattern");
    static ref PAIR: Regex = Regex::new(r"\{([^}]+)\}").expect("shuffle pair pattern");
    static ref FIELD_SEPARATOR: Regex = Regex::new(r"[;,]").expect("field separator pattern");
}

/// An inclusive 1-based range of the string table to reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShuffleInstruction {
    pub start: i64,
    pub end: i64,
}

impl ShuffleInstruction {
    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Reverses `entries[start-1..=end-1]` in place with two pointers.
    ///
    /// A step whose indices fall outside `entries` is skipped; the pointers
    /// still move inward. Leading out-of-range steps are jumped over in one go,
    /// so the cost is bounded by the slice length, not by the bounds.
    pub fn apply<T>(&self, entries: &mut [T]) {
        let len = entries.len() as i128;
        let mut lo = i128::from(self.start) - 1;
        let mut hi = i128::from(self.end) - 1;

        let skip = 0i128.max(-lo).max(hi - (len - 1));
        lo += skip;
        hi -= skip;

        while lo < hi {
            entries.swap(lo as usize, hi as usize);
            lo += 1;
            hi -= 1;
        }
    }
}

/// Finds the `for a, b in ipairs({{s, e}, ...}) do` permutation loop and
/// evaluates its pairs in source order.
pub fn find_instructions(source: &str) -> Vec<ShuffleInstruction> {
    let Some(caps) = SHUFFLE_LOOP.captures(source) else {
        return Vec::new();
    };
    let Some(body) = caps.get(3) else {
        return Vec::new();
    };

    let instructions: Vec<_> = PAIR
        .captures_iter(body.as_str())
        .filter_map(|pair| {
            let fields: Vec<&str> = FIELD_SEPARATOR.split(pair.get(1)?.as_str()).collect();
            if fields.len() < 2 {
                return None;
            }
            Some(ShuffleInstruction::new(
                expr::evaluate(fields[0]).as_index(),
                expr::evaluate(fields[1]).as_index(),
            ))
        })
        .collect();

    log::debug!("[SHUFFLE] {} instructions", instructions.len());
    instructions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("s{i}")).collect()
    }

    #[test]
    fn test_reverse_inner_range() {
        let mut entries = labels(6);
        ShuffleInstruction::new(2, 5).apply(&mut entries);
        assert_eq!(entries, ["s1", "s5", "s4", "s3", "s2", "s6"]);
    }

    #[test]
    fn test_instructions_compose_in_order() {
        let mut entries = labels(4);
        for instruction in [ShuffleInstruction::new(1, 4), ShuffleInstruction::new(1, 2)] {
            instruction.apply(&mut entries);
        }
        assert_eq!(entries, ["s3", "s4", "s2", "s1"]);
    }

    #[test]
    fn test_out_of_range_steps_skipped() {
        let mut entries = labels(3);
        ShuffleInstruction::new(0, 3).apply(&mut entries);
        assert_eq!(entries, ["s2", "s1", "s3"]);

        let mut entries = labels(3);
        ShuffleInstruction::new(3, 1).apply(&mut entries);
        assert_eq!(entries, labels(3));
    }

    #[test]
    fn test_huge_bounds_finish_quickly() {
        let mut entries = labels(3);
        ShuffleInstruction::new(1, i64::MAX).apply(&mut entries);
        assert_eq!(entries, labels(3));

        let mut entries = labels(5);
        ShuffleInstruction::new(i64::MIN, 1 << 40).apply(&mut entries);
        assert_eq!(entries, labels(5));

        let mut entries = labels(5);
        ShuffleInstruction::new(-1, 5).apply(&mut entries);
        assert_eq!(entries, ["s3", "s2", "s1", "s4", "s5"]);

        let mut empty: Vec<String> = Vec::new();
        ShuffleInstruction::new(1, i64::MAX).apply(&mut empty);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_huge_bound_from_source() {
        let src = "for a,b in ipairs({{1, 2**40}, {1, 1e300}}) do end";
        let instructions = find_instructions(src);
        assert_eq!(
            instructions,
            vec![
                ShuffleInstruction::new(1, 1 << 40),
                ShuffleInstruction::new(1, i64::MAX),
            ]
        );

        let mut entries = labels(3);
        for instruction in &instructions {
            instruction.apply(&mut entries);
        }
        assert_eq!(entries, labels(3));
    }

    #[test]
    fn test_find_instructions() {
        let src = r"
local x = 1
for i, v in ipairs({{1, 3}; {2 + 2, 10 - 4}, {(1), 7 % 4;}}) do
    local a, b = v[1], v[2]
end
";
        assert_eq!(
            find_instructions(src),
            vec![
                ShuffleInstruction::new(1, 3),
                ShuffleInstruction::new(4, 6),
                ShuffleInstruction::new(1, 3),
            ]
        );
    }

    #[test]
    fn test_unsafe_bounds_become_zero() {
        let src = "for a,b in ipairs({{x, 2}, {3}}) do end";
        assert_eq!(find_instructions(src), vec![ShuffleInstruction::new(0, 2)]);
    }

    #[test]
    fn test_no_shuffle_loop() {
        assert!(find_instructions("for i = 1, 10 do end").is_empty());
    }
}
