// ── Engram: Tokenizer Boundary ──────────────────────────────────────────────
//
// The pretrained tokenizer is an external collaborator. Everything in the
// core consumes it through `TokenEncoder`, so a real BPE tokenizer can be
// plugged in by the model-loading component.
//
// `Tokenizer` is the built-in fallback used when nothing else is plugged in
// (CLI, standalone server, tests). It is deterministic: same text, same ids,
// across runs and restarts.
//
// Strategy:
//   1. Lexical: split into word / number / punctuation runs and map each
//      piece into the vocabulary with FNV-1a. Whitespace is dropped.
//   2. Byte: every UTF-8 byte is its own token (vocab must cover 256).

use crate::atoms::constants::{FNV_OFFSET, FNV_PRIME};
use crate::atoms::engram_types::TokenizerType;

/// Anything that turns text into token ids inside `[0, vocab_size)`.
pub trait TokenEncoder: Send + Sync {
    fn encode(&self, text: &str) -> Vec<u32>;
    fn vocab_size(&self) -> u32;
}

/// Built-in deterministic tokenizer.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    kind: TokenizerType,
    vocab_size: u32,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Word,
    Digit,
    Space,
    Punct,
}

fn classify(c: char) -> CharClass {
    if c.is_alphabetic() || c == '_' {
        CharClass::Word
    } else if c.is_numeric() {
        CharClass::Digit
    } else if c.is_whitespace() {
        CharClass::Space
    } else {
        CharClass::Punct
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut h = FNV_OFFSET;
    for b in bytes {
        h ^= *b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

impl Tokenizer {
    /// Create a tokenizer of the given kind.
    ///
    /// Byte tokenization needs at least 256 ids; smaller vocabularies fall
    /// back to lexical so every emitted id stays in range.
    pub fn new(kind: TokenizerType, vocab_size: u32) -> Self {
        let kind = if kind == TokenizerType::Byte && vocab_size < 256 {
            log::warn!(
                "[engram:tokenizer] vocab_size {} cannot hold byte tokens, using lexical",
                vocab_size
            );
            TokenizerType::Lexical
        } else {
            kind
        };
        Self {
            kind,
            vocab_size: vocab_size.max(1),
        }
    }

    /// Lexical tokenizer (the default).
    pub fn lexical(vocab_size: u32) -> Self {
        Self::new(TokenizerType::Lexical, vocab_size)
    }

    pub fn kind(&self) -> TokenizerType {
        self.kind
    }

    /// Split text into the pieces the lexical tokenizer hashes.
    /// Punctuation is emitted one character at a time; words and numbers
    /// are maximal runs.
    pub fn pieces<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut out = Vec::new();
        let mut start: Option<(usize, CharClass)> = None;

        for (i, c) in text.char_indices() {
            let class = classify(c);
            if let Some((s, cls)) = start {
                if cls == class && class != CharClass::Punct {
                    continue;
                }
                if cls != CharClass::Space {
                    out.push(&text[s..i]);
                }
            }
            start = Some((i, class));
        }
        if let Some((s, cls)) = start {
            if cls != CharClass::Space {
                out.push(&text[s..]);
            }
        }
        out
    }
}

impl TokenEncoder for Tokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        match self.kind {
            TokenizerType::Byte => text.bytes().map(|b| b as u32).collect(),
            TokenizerType::Lexical => self
                .pieces(text)
                .into_iter()
                .map(|p| (fnv1a(p.as_bytes()) % self.vocab_size as u64) as u32)
                .collect(),
        }
    }

    fn vocab_size(&self) -> u32 {
        self.vocab_size
    }
}
