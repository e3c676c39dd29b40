//! Bracketed numeric range tokens: `node[10-25]`, `node[001-100]`,
//! `192.168.1.[20]`.

use crate::error::RangeError;

/// A parsed `<prefix>[<low>-<high>]<suffix>` token.
///
/// The single-bound form `<prefix>[<n>]<suffix>` names one substitution
/// point; it expands to a single value on its own, or pairs positionally
/// with another expansion via [`RangePattern::expand_from`] (used for
/// `ipaddress:` templates on ranged node lines).
///
/// Expanded numbers are zero-padded to the wider of the two bounds' original
/// digit counts, so `node[001-100]` yields `node001` through `node100` while
/// `node[10-25]` yields plain `node10` through `node25`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangePattern {
    prefix: String,
    suffix: String,
    low: u64,
    high: Option<u64>,
    width: usize,
}

impl RangePattern {
    /// Parse a token. Returns `Ok(None)` when the token contains no bracket
    /// at all; any bracket that is present must form a valid range.
    pub fn parse(token: &str) -> Result<Option<Self>, RangeError> {
        let malformed = || RangeError::Malformed {
            token: token.to_string(),
        };
        let Some(open) = token.find('[') else {
            if token.contains(']') {
                return Err(malformed());
            }
            return Ok(None);
        };
        let close = token.find(']').ok_or_else(malformed)?;
        if close < open {
            return Err(malformed());
        }
        let suffix = &token[close + 1..];
        if suffix.contains('[') {
            // a second bracket pair is a hard error, not a guess
            return Err(RangeError::MultipleRanges {
                token: token.to_string(),
            });
        }
        if suffix.contains(']') {
            return Err(malformed());
        }
        let inner = &token[open + 1..close];
        let (low_str, high_str) = match inner.split_once('-') {
            Some((low, high)) => (low, Some(high)),
            None => (inner, None),
        };
        let low = parse_bound(low_str).ok_or_else(malformed)?;
        let high = match high_str {
            Some(s) => Some(parse_bound(s).ok_or_else(malformed)?),
            None => None,
        };
        if let Some(high) = high {
            if low > high {
                return Err(RangeError::Inverted {
                    token: token.to_string(),
                    low,
                    high,
                });
            }
        }
        let width = padded_width(token, low_str, high_str)?;
        Ok(Some(Self {
            prefix: token[..open].to_string(),
            suffix: suffix.to_string(),
            low,
            high,
            width,
        }))
    }

    /// Number of names this pattern expands to on its own.
    pub fn len(&self) -> usize {
        match self.high {
            Some(high) => (high - self.low + 1) as usize,
            None => 1,
        }
    }

    /// A range token never expands to zero names.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether this is the single-bound `[<n>]` substitution form.
    pub fn is_single(&self) -> bool {
        self.high.is_none()
    }

    /// Lazily expand to literal names.
    pub fn expand(&self) -> impl Iterator<Item = String> + '_ {
        let high = self.high.unwrap_or(self.low);
        (self.low..=high).map(move |n| self.render(n))
    }

    /// Expand to `count` consecutive values starting at the low bound,
    /// regardless of the high bound. The Nth value pairs with the Nth name
    /// of the expansion that dictated `count`.
    pub fn expand_from(&self, count: usize) -> impl Iterator<Item = String> + '_ {
        (self.low..self.low + count as u64).map(move |n| self.render(n))
    }

    fn render(&self, n: u64) -> String {
        format!("{}{:0w$}{}", self.prefix, n, self.suffix, w = self.width)
    }
}

fn parse_bound(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// A bound with a leading zero declares a fixed padding width; both bounds
/// must then agree on it, otherwise the padding would be ambiguous
/// (e.g. `[01-100]`).
fn padded_width(token: &str, low_str: &str, high_str: Option<&str>) -> Result<usize, RangeError> {
    let width = low_str.len().max(high_str.map_or(0, str::len));
    let declares = |s: &str| s.len() > 1 && s.starts_with('0');
    let conflict = declares(low_str) && low_str.len() != width
        || high_str.is_some_and(|s| declares(s) && s.len() != width);
    if conflict {
        return Err(RangeError::AmbiguousPadding {
            token: token.to_string(),
        });
    }
    Ok(width)
}
