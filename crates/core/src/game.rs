//! Game input model: moves, evaluation samples and annotations.
//!
//! Everything here is immutable job input. Evaluation field aliases
//! (`evaluation`, `eval`, `score`) are resolved by the deserializer so the
//! rest of the compiler only ever sees [`EvaluationSample::centipawns`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Ply;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Standard algebraic notation for a single half-move, optionally followed by
/// check/mate markers and annotation glyphs.
const SAN_PATTERN: &str = concat!(
    r"^(?:[KQRBN][a-h]?[1-8]?x?[a-h][1-8]",
    r"|[a-h](?:x[a-h])?[1-8](?:=?[QRBN])?",
    r"|O-O(?:-O)?|0-0(?:-0)?)",
    r"[+#]?(?:[!?]{1,2})?$",
);

static SAN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(SAN_PATTERN).expect("valid regex"));

/// Move-number prefixes such as `12.` or `12...`, possibly glued to the move.
static MOVE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.+").expect("valid regex"));

/// Game termination markers accepted at the end of movetext.
const RESULT_TOKENS: &[&str] = &["1-0", "0-1", "1/2-1/2", "*"];

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// A single half-move. Applying move `ply` yields position `ply + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub ply: Ply,
    pub san: String,
}

impl Move {
    /// Full-move number this half-move belongs to (1-based).
    pub fn move_number(&self) -> usize {
        self.ply / 2 + 1
    }

    pub fn is_white(&self) -> bool {
        self.ply % 2 == 0
    }

    /// `"12. Nf3"` for White, `"12... Nf6"` for Black.
    pub fn numbered(&self) -> String {
        if self.is_white() {
            format!("{}. {}", self.move_number(), self.san)
        } else {
            format!("{}... {}", self.move_number(), self.san)
        }
    }
}

/// Engine evaluation of the position after `ply` half-moves, in centipawns
/// from White's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationSample {
    pub ply: Ply,
    #[serde(alias = "evaluation", alias = "eval", alias = "score")]
    pub centipawns: i32,
}

/// Human commentary attached to a position. Ply 0 means "before move 1".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub ply: Ply,
    pub text: String,
}

/// Complete immutable input for one job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub moves: Vec<Move>,
    #[serde(default)]
    pub evaluations: Vec<EvaluationSample>,
    #[serde(default)]
    pub annotations: BTreeMap<Ply, String>,
}

impl GameRecord {
    /// Build a record from a plain SAN list, numbering plies in order.
    pub fn from_sans<I, S>(sans: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let moves = sans
            .into_iter()
            .enumerate()
            .map(|(ply, san)| Move {
                ply,
                san: san.into(),
            })
            .collect();
        Self {
            moves,
            ..Self::default()
        }
    }

    pub fn with_evaluations(mut self, evaluations: Vec<EvaluationSample>) -> Self {
        self.evaluations = evaluations;
        self
    }

    pub fn with_annotation(mut self, ply: Ply, text: impl Into<String>) -> Self {
        self.annotations.insert(ply, text.into());
        self
    }

    /// Number of half-moves; positions run `0..=ply_count()`.
    pub fn ply_count(&self) -> Ply {
        self.moves.len()
    }

    pub fn annotation_at(&self, ply: Ply) -> Option<&str> {
        self.annotations.get(&ply).map(String::as_str)
    }

    /// The move that produced position `ply`, if any (ply 0 has none).
    pub fn move_into(&self, ply: Ply) -> Option<&Move> {
        ply.checked_sub(1).and_then(|i| self.moves.get(i))
    }

    /// Annotations as a flat list, ordered by ply.
    pub fn annotation_list(&self) -> Vec<Annotation> {
        self.annotations
            .iter()
            .map(|(ply, text)| Annotation {
                ply: *ply,
                text: text.clone(),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Movetext parsing
// ---------------------------------------------------------------------------

/// Whether `token` is a single SAN half-move (glyphs and check marks allowed).
pub fn is_san(token: &str) -> bool {
    SAN_RE.is_match(token)
}

/// Movetext parsed without rejecting bad moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LenientMoves {
    pub moves: Vec<Move>,
    /// Ply of the first token that is not valid SAN, if any.
    pub first_invalid: Option<Ply>,
}

/// Parse PGN-style movetext into an ordered move list.
///
/// Skips move numbers, `{comments}`, `;` line comments, `(variations)`,
/// NAGs (`$n`) and a trailing result token. Every remaining token must be
/// valid SAN. Annotation glyphs (`!`, `?`) are stripped from the stored move.
pub fn parse_movetext(movetext: &str) -> Result<Vec<Move>, CoreError> {
    let mut moves = Vec::new();
    for (index, raw, san) in move_tokens(movetext)? {
        if !is_san(&san) {
            return Err(CoreError::Parse {
                index,
                token: raw,
                reason: "not a SAN move".to_string(),
            });
        }
        moves.push(Move {
            ply: moves.len(),
            san: san.trim_end_matches(['!', '?']).to_string(),
        });
    }
    Ok(moves)
}

/// Like [`parse_movetext`], but a token that is not SAN is kept as a move
/// so replay can stop at it. Unbalanced comments or variations still fail.
pub fn parse_movetext_lenient(movetext: &str) -> Result<LenientMoves, CoreError> {
    let mut moves = Vec::new();
    let mut first_invalid = None;
    for (_, _, san) in move_tokens(movetext)? {
        let ply = moves.len();
        if first_invalid.is_none() && !is_san(&san) {
            first_invalid = Some(ply);
        }
        moves.push(Move {
            ply,
            san: san.trim_end_matches(['!', '?']).to_string(),
        });
    }
    Ok(LenientMoves {
        moves,
        first_invalid,
    })
}

/// `(token index, raw token, token without move number)` for every move
/// token before the result marker.
fn move_tokens(movetext: &str) -> Result<Vec<(usize, String, String)>, CoreError> {
    let mut out = Vec::new();
    for (index, raw) in tokenize(movetext)?.into_iter().enumerate() {
        let token = MOVE_NUMBER_RE.replace(&raw, "").into_owned();
        if token.is_empty() || token.starts_with('$') {
            continue;
        }
        if RESULT_TOKENS.contains(&token.as_str()) {
            break;
        }
        out.push((index, raw, token));
    }
    Ok(out)
}

/// Split movetext into whitespace-separated tokens outside comments and
/// variations.
fn tokenize(movetext: &str) -> Result<Vec<String>, CoreError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_brace = false;
    let mut in_line_comment = false;
    let mut variation_depth = 0usize;

    let flush = |current: &mut String, tokens: &mut Vec<String>| {
        if !current.is_empty() {
            tokens.push(std::mem::take(current));
        }
    };

    for c in movetext.chars() {
        if in_line_comment {
            if c == '\n' {
                in_line_comment = false;
            }
            continue;
        }
        if in_brace {
            if c == '}' {
                in_brace = false;
            }
            continue;
        }
        match c {
            '{' => {
                flush(&mut current, &mut tokens);
                in_brace = true;
            }
            '}' => return Err(unbalanced(tokens.len(), "}")),
            ';' => {
                flush(&mut current, &mut tokens);
                in_line_comment = true;
            }
            '(' => {
                flush(&mut current, &mut tokens);
                variation_depth += 1;
            }
            ')' => {
                if variation_depth == 0 {
                    return Err(unbalanced(tokens.len(), ")"));
                }
                current.clear();
                variation_depth -= 1;
            }
            c if c.is_whitespace() => {
                if variation_depth == 0 {
                    flush(&mut current, &mut tokens);
                } else {
                    current.clear();
                }
            }
            c => {
                if variation_depth == 0 {
                    current.push(c);
                }
            }
        }
    }

    if in_brace {
        return Err(unbalanced(tokens.len(), "{"));
    }
    if variation_depth > 0 {
        return Err(unbalanced(tokens.len(), "("));
    }
    flush(&mut current, &mut tokens);
    Ok(tokens)
}

fn unbalanced(index: usize, token: &str) -> CoreError {
    CoreError::Parse {
        index,
        token: token.to_string(),
        reason: "unbalanced delimiter".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn sans(moves: &[Move]) -> Vec<&str> {
        moves.iter().map(|m| m.san.as_str()).collect()
    }

    // -- parse_movetext --

    #[test]
    fn parses_numbered_movetext() {
        let moves = parse_movetext("1. e4 e5 2. Nf3 Nc6 3. Bb5 a6").unwrap();
        assert_eq!(sans(&moves), ["e4", "e5", "Nf3", "Nc6", "Bb5", "a6"]);
        assert_eq!(moves[5].ply, 5);
    }

    #[test]
    fn parses_glued_move_numbers_and_black_continuation() {
        let moves = parse_movetext("1.e4 1... c5 2.Nf3").unwrap();
        assert_eq!(sans(&moves), ["e4", "c5", "Nf3"]);
    }

    #[test]
    fn skips_comments_variations_and_nags() {
        let text = "1. e4 {best by test} e5 (1... c5 2. Nf3) 2. Nf3 $1 ; line comment\n Nc6";
        let moves = parse_movetext(text).unwrap();
        assert_eq!(sans(&moves), ["e4", "e5", "Nf3", "Nc6"]);
    }

    #[test]
    fn stops_at_result_token() {
        let moves = parse_movetext("1. f3 e5 2. g4 Qh4# 0-1").unwrap();
        assert_eq!(sans(&moves), ["f3", "e5", "g4", "Qh4#"]);
    }

    #[test]
    fn strips_annotation_glyphs() {
        let moves = parse_movetext("1. e4! e5?? 2. Qh5!?").unwrap();
        assert_eq!(sans(&moves), ["e4", "e5", "Qh5"]);
    }

    #[test]
    fn accepts_castling_and_promotion() {
        let moves = parse_movetext("O-O O-O-O e8=Q+ exd8=N bxa1Q#").unwrap();
        assert_eq!(moves.len(), 5);
    }

    #[test]
    fn empty_movetext_is_an_empty_game() {
        assert!(parse_movetext("").unwrap().is_empty());
        assert!(parse_movetext("  *  ").unwrap().is_empty());
    }

    #[test]
    fn rejects_garbage_token() {
        let err = parse_movetext("1. e4 banana").unwrap_err();
        assert_matches!(err, CoreError::Parse { token, .. } if token == "banana");
    }

    #[test]
    fn rejects_unbalanced_comment() {
        assert_matches!(
            parse_movetext("1. e4 {unterminated"),
            Err(CoreError::Parse { .. })
        );
        assert_matches!(parse_movetext("1. e4 }"), Err(CoreError::Parse { .. }));
    }

    #[test]
    fn rejects_unbalanced_variation() {
        assert_matches!(parse_movetext("1. e4 (1. d4"), Err(CoreError::Parse { .. }));
        assert_matches!(parse_movetext("1. e4 )"), Err(CoreError::Parse { .. }));
    }

    // -- is_san / parse_movetext_lenient --

    #[test]
    fn is_san_accepts_moves_and_rejects_words() {
        for token in ["e4", "Nxf7+", "O-O-O", "e8=Q#", "Qh5!?"] {
            assert!(is_san(token), "{token}");
        }
        for token in ["banana", "", "e9", "Zf3"] {
            assert!(!is_san(token), "{token}");
        }
    }

    #[test]
    fn lenient_parse_keeps_bad_token_and_marks_it() {
        let parsed = parse_movetext_lenient("1. e4 e5 2. banana Nc6 1-0").unwrap();
        assert_eq!(sans(&parsed.moves), ["e4", "e5", "banana", "Nc6"]);
        assert_eq!(parsed.first_invalid, Some(2));
    }

    #[test]
    fn lenient_parse_of_clean_movetext_matches_strict() {
        let parsed = parse_movetext_lenient("1. e4 e5 2. Nf3").unwrap();
        assert_eq!(parsed.moves, parse_movetext("1. e4 e5 2. Nf3").unwrap());
        assert!(parsed.first_invalid.is_none());
    }

    #[test]
    fn lenient_parse_still_rejects_unbalanced_comment() {
        assert_matches!(
            parse_movetext_lenient("1. e4 {open"),
            Err(CoreError::Parse { .. })
        );
    }

    // -- Move --

    #[test]
    fn numbered_move_labels() {
        let white = Move { ply: 22, san: "Nf3".into() };
        let black = Move { ply: 23, san: "Nf6".into() };
        assert_eq!(white.numbered(), "12. Nf3");
        assert_eq!(black.numbered(), "12... Nf6");
    }

    // -- GameRecord --

    #[test]
    fn move_into_maps_positions_to_moves() {
        let game = GameRecord::from_sans(["e4", "e5"]);
        assert!(game.move_into(0).is_none());
        assert_eq!(game.move_into(1).unwrap().san, "e4");
        assert_eq!(game.move_into(2).unwrap().san, "e5");
        assert!(game.move_into(3).is_none());
    }

    #[test]
    fn evaluation_field_aliases_normalize() {
        for field in ["centipawns", "evaluation", "eval", "score"] {
            let json = format!(r#"{{"ply": 4, "{field}": -120}}"#);
            let sample: EvaluationSample = serde_json::from_str(&json).unwrap();
            assert_eq!(sample.centipawns, -120, "field {field}");
        }
    }

    #[test]
    fn annotations_deserialize_from_ply_keyed_map() {
        let json = r#"{"moves": [], "annotations": {"0": "Opening idea", "3": "Sharp"}}"#;
        let game: GameRecord = serde_json::from_str(json).unwrap();
        assert_eq!(game.annotation_at(0), Some("Opening idea"));
        assert_eq!(game.annotation_at(3), Some("Sharp"));
        assert_eq!(game.annotation_list().len(), 2);
    }
}
