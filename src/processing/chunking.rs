//! Token-aware chunking strategies.
//!
//! Every strategy is a pure function over text and a [`Tokenizer`]:
//!
//! - Token window: encode the whole text, slide a window of `chunk_size` tokens forward by
//!   `chunk_size - chunk_overlap`, decode every window. Windows concatenate back into the
//!   original token sequence once the overlap is removed.
//! - Recursive separator: split on paragraph breaks, then line breaks, then spaces, then single
//!   characters, until every piece fits the token budget; greedily merge neighbouring pieces
//!   back up to `chunk_size` tokens, carrying up to `chunk_overlap` tokens of trailing pieces
//!   into the next chunk.
//! - Markdown header: group lines under their `#`, `##` and `###` headers (header lines are
//!   dropped), then split each section with the recursive strategy. Chunks carry the header
//!   path they were found under.

use std::collections::VecDeque;
use std::str::FromStr;

use super::types::ChunkingError;
use crate::tokenizer::Tokenizer;

/// Separators tried in priority order by the recursive strategy. The empty separator slices
/// individual characters.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Chunking strategy selected by the ingestion orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChunkingStrategy {
    /// Fixed windows over the token sequence.
    TokenWindow,
    /// Separator-driven splitting measured in tokens.
    #[default]
    RecursiveSeparator,
    /// Sections delimited by markdown headers, each split like [`Self::RecursiveSeparator`].
    MarkdownHeader,
}

impl FromStr for ChunkingStrategy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "token" | "token_window" | "token-window" => Ok(Self::TokenWindow),
            "recursive" | "recursive_separator" | "recursive-separator" => {
                Ok(Self::RecursiveSeparator)
            }
            "markdown" | "markdown_header" | "markdown-header" => Ok(Self::MarkdownHeader),
            _ => Err(()),
        }
    }
}

/// Validated chunk size and overlap, both measured in tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl ChunkParams {
    /// Validate `0 <= chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ChunkingError> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(ChunkingError::InvalidParameters {
                chunk_size,
                chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Upper bound on tokens per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Tokens repeated between adjacent chunks.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Distance between the starts of adjacent token windows.
    pub fn step(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

/// A contiguous span of source text produced by the chunker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Chunk contents.
    pub text: String,
    /// Token count reported by the tokenizer for `text`.
    pub token_count: usize,
    /// Position of the chunk in the chunker output.
    pub source_index: usize,
    /// Markdown headers enclosing the chunk; empty outside the markdown strategy.
    pub headers: HeaderPath,
}

/// Title, section and subsection headers (`#`, `##`, `###`) in effect for a span of markdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderPath {
    /// Text of the enclosing `#` header.
    pub title: Option<String>,
    /// Text of the enclosing `##` header.
    pub section: Option<String>,
    /// Text of the enclosing `###` header.
    pub subsection: Option<String>,
}

impl HeaderPath {
    /// True when no header encloses the span.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.section.is_none() && self.subsection.is_none()
    }

    /// Enter a header at `level`, closing every deeper level.
    fn enter(&mut self, level: usize, name: String) {
        match level {
            1 => {
                self.title = Some(name);
                self.section = None;
                self.subsection = None;
            }
            2 => {
                self.section = Some(name);
                self.subsection = None;
            }
            _ => self.subsection = Some(name),
        }
    }
}

/// Split one or more texts into ordered chunks.
///
/// Chunks of every input are emitted in input order and numbered consecutively through
/// `source_index`. An empty input list (or inputs without content) yields no chunks.
pub fn chunk<I, S>(
    texts: I,
    strategy: ChunkingStrategy,
    params: ChunkParams,
    tokenizer: &dyn Tokenizer,
) -> Result<Vec<Chunk>, ChunkingError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let splitter = RecursiveSplitter::new(params, tokenizer, &DEFAULT_SEPARATORS);
    let mut chunks = Vec::new();
    for text in texts {
        let sections = match strategy {
            ChunkingStrategy::TokenWindow => vec![(
                HeaderPath::default(),
                token_windows(text.as_ref(), params, tokenizer)?,
            )],
            ChunkingStrategy::RecursiveSeparator => {
                vec![(HeaderPath::default(), splitter.split(text.as_ref())?)]
            }
            ChunkingStrategy::MarkdownHeader => markdown_sections(text.as_ref())
                .into_iter()
                .map(|(headers, body)| Ok((headers, splitter.split(&body)?)))
                .collect::<Result<Vec<_>, ChunkingError>>()?,
        };
        for (headers, pieces) in sections {
            for (text, token_count) in pieces {
                chunks.push(Chunk {
                    text,
                    token_count,
                    source_index: chunks.len(),
                    headers: headers.clone(),
                });
            }
        }
    }
    tracing::trace!(?strategy, chunks = chunks.len(), "Chunked input");
    Ok(chunks)
}

/// Slide a `chunk_size` window across the token sequence.
///
/// The final window is the first one that reaches the end of the sequence, so every window but
/// the last holds exactly `chunk_size` tokens and no window is fully contained in its
/// predecessor.
fn token_windows(
    text: &str,
    params: ChunkParams,
    tokenizer: &dyn Tokenizer,
) -> Result<Vec<(String, usize)>, ChunkingError> {
    let tokens = tokenizer.encode(text)?;
    let total = tokens.len();
    let mut windows = Vec::new();
    let mut start = 0;

    while start < total {
        let end = (start + params.chunk_size()).min(total);
        let window = &tokens[start..end];
        windows.push((tokenizer.decode(window)?, window.len()));
        if end == total {
            break;
        }
        start += params.step();
    }

    Ok(windows)
}

/// Group lines under the markdown headers in effect for them.
///
/// Only `#`, `##` and `###` followed by a space (or ending the line) open a section; deeper
/// headers and lines inside fenced code blocks are ordinary content. Header lines are dropped,
/// and sections without content are skipped. Text before the first header has an empty path.
fn markdown_sections(text: &str) -> Vec<(HeaderPath, String)> {
    let mut sections = Vec::new();
    let mut headers = HeaderPath::default();
    let mut body: Vec<&str> = Vec::new();
    let mut fence: Option<&str> = None;

    for line in text.lines() {
        let stripped = line.trim();
        match fence {
            Some(marker) if stripped.starts_with(marker) => fence = None,
            Some(_) => {}
            None => {
                if let Some(marker) = ["```", "~~~"]
                    .into_iter()
                    .find(|marker| stripped.starts_with(marker))
                {
                    fence = Some(marker);
                } else if let Some((level, name)) = parse_header(stripped) {
                    flush_section(&mut sections, &headers, &mut body);
                    headers.enter(level, name);
                    continue;
                }
            }
        }
        body.push(line);
    }
    flush_section(&mut sections, &headers, &mut body);
    sections
}

fn parse_header(line: &str) -> Option<(usize, String)> {
    ["###", "##", "#"].into_iter().find_map(|marker| {
        let rest = line.strip_prefix(marker)?;
        (rest.is_empty() || rest.starts_with(' ')).then(|| (marker.len(), rest.trim().to_string()))
    })
}

fn flush_section(
    sections: &mut Vec<(HeaderPath, String)>,
    headers: &HeaderPath,
    body: &mut Vec<&str>,
) {
    let joined = body.join("\n");
    body.clear();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        sections.push((headers.clone(), trimmed.to_string()));
    }
}

struct RecursiveSplitter<'a> {
    params: ChunkParams,
    tokenizer: &'a dyn Tokenizer,
    separators: &'a [&'a str],
}

impl<'a> RecursiveSplitter<'a> {
    fn new(params: ChunkParams, tokenizer: &'a dyn Tokenizer, separators: &'a [&'a str]) -> Self {
        Self {
            params,
            tokenizer,
            separators,
        }
    }

    fn split(&self, text: &str) -> Result<Vec<(String, usize)>, ChunkingError> {
        self.split_with(text, self.separators)?
            .into_iter()
            .map(|chunk| {
                let count = self.tokenizer.count(&chunk)?;
                Ok((chunk, count))
            })
            .collect()
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Result<Vec<String>, ChunkingError> {
        let (separator, remaining) = select_separator(text, separators);
        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for piece in split_on(text, separator) {
            if self.tokenizer.count(piece)? < self.params.chunk_size() {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting, separator)?);
                fitting.clear();
            }

            if remaining.is_empty() {
                // Nothing left to split on; the piece is emitted whole.
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_with(piece, remaining)?);
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting, separator)?);
        }

        Ok(chunks)
    }

    /// Greedily join pieces up to the token budget, keeping trailing pieces worth at most
    /// `chunk_overlap` tokens as the head of the next chunk.
    fn merge(&self, pieces: &[&str], separator: &str) -> Result<Vec<String>, ChunkingError> {
        let chunk_size = self.params.chunk_size();
        let overlap = self.params.chunk_overlap();
        let separator_len = if separator.is_empty() {
            0
        } else {
            self.tokenizer.count(separator)?
        };

        let mut merged = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = self.tokenizer.count(piece)?;
            let joiner = |occupied: bool| if occupied { separator_len } else { 0 };

            if !window.is_empty() && total + len + separator_len > chunk_size {
                push_joined(&mut merged, &window, separator);
                while total > overlap
                    || (total > 0 && total + len + joiner(!window.is_empty()) > chunk_size)
                {
                    let Some((_, first_len)) = window.pop_front() else {
                        total = 0;
                        break;
                    };
                    total = total.saturating_sub(first_len + joiner(!window.is_empty()));
                }
            }

            total += len + joiner(!window.is_empty());
            window.push_back((piece, len));
        }

        push_joined(&mut merged, &window, separator);
        Ok(merged)
    }
}

fn select_separator<'s>(text: &str, separators: &'s [&'s str]) -> (&'s str, &'s [&'s str]) {
    for (idx, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return ("", &[]);
        }
        if text.contains(separator) {
            return (separator, &separators[idx + 1..]);
        }
    }
    ("", &[])
}

fn split_on<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(offset, ch)| &text[offset..offset + ch.len_utf8()])
            .collect();
    }
    text.split(separator)
        .filter(|piece| !piece.is_empty())
        .collect()
}

fn push_joined(merged: &mut Vec<String>, window: &VecDeque<(&str, usize)>, separator: &str) {
    if window.is_empty() {
        return;
    }
    let joined = window
        .iter()
        .map(|(piece, _)| *piece)
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        merged.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::TiktokenTokenizer;
    use crate::tokenizer::testing::CharTokenizer;

    /// One token per whitespace-delimited word; decoding joins with single spaces.
    struct WordTokenizer;

    impl Tokenizer for WordTokenizer {
        fn encode(&self, text: &str) -> Result<Vec<u32>, crate::tokenizer::TokenizerError> {
            Ok(text.split_whitespace().map(|word| word.len() as u32).collect())
        }

        fn decode(&self, _ids: &[u32]) -> Result<String, crate::tokenizer::TokenizerError> {
            unreachable!("word tokenizer is only used for counting")
        }
    }

    fn params(size: usize, overlap: usize) -> ChunkParams {
        ChunkParams::new(size, overlap).unwrap()
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        for (size, overlap) in [(0, 0), (10, 10), (10, 11)] {
            let error = ChunkParams::new(size, overlap).unwrap_err();
            assert!(matches!(error, ChunkingError::InvalidParameters { .. }));
        }
        assert!(ChunkParams::new(10, 9).is_ok());
    }

    #[test]
    fn strategy_parses_known_names() {
        assert_eq!(
            "token".parse::<ChunkingStrategy>(),
            Ok(ChunkingStrategy::TokenWindow)
        );
        assert_eq!(
            "Recursive".parse::<ChunkingStrategy>(),
            Ok(ChunkingStrategy::RecursiveSeparator)
        );
        assert_eq!(
            "markdown".parse::<ChunkingStrategy>(),
            Ok(ChunkingStrategy::MarkdownHeader)
        );
        assert!("semantic".parse::<ChunkingStrategy>().is_err());
    }

    #[test]
    fn token_window_scenario_500_over_1200_tokens() {
        let text: String = (0..1200)
            .map(|idx| char::from(b'a' + (idx % 26) as u8))
            .collect();
        let chunks = chunk(
            [text.as_str()],
            ChunkingStrategy::TokenWindow,
            params(500, 50),
            &CharTokenizer,
        )
        .unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, text[0..500]);
        assert_eq!(chunks[1].text, text[450..950]);
        assert_eq!(chunks[2].text, text[900..1200]);
        assert_eq!(
            chunks.iter().map(|c| c.token_count).collect::<Vec<_>>(),
            vec![500, 500, 300]
        );
        assert_eq!(
            chunks.iter().map(|c| c.source_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn token_windows_reconstruct_the_token_sequence() {
        let tokenizer = CharTokenizer;
        let text = "Retrieval grounds answers in stored passages. ".repeat(7);
        let original = tokenizer.encode(&text).unwrap();

        for size in 1..=24 {
            for overlap in 0..size {
                let chunks = chunk(
                    [text.as_str()],
                    ChunkingStrategy::TokenWindow,
                    params(size, overlap),
                    &tokenizer,
                )
                .unwrap();

                let mut rebuilt = tokenizer.encode(&chunks[0].text).unwrap();
                for chunk in &chunks[1..] {
                    let tokens = tokenizer.encode(&chunk.text).unwrap();
                    rebuilt.extend_from_slice(&tokens[overlap..]);
                }
                assert_eq!(rebuilt, original, "size={size} overlap={overlap}");

                let total = original.len();
                let expected = (total - overlap).div_ceil(size - overlap);
                assert_eq!(chunks.len(), expected, "size={size} overlap={overlap}");
                for chunk in &chunks[..chunks.len() - 1] {
                    assert_eq!(chunk.token_count, size);
                }
                let last = chunks.last().unwrap().token_count;
                assert!((1..=size).contains(&last));
            }
        }
    }

    #[test]
    fn short_input_within_overlap_still_yields_one_chunk() {
        let chunks = chunk(
            ["abc"],
            ChunkingStrategy::TokenWindow,
            params(10, 5),
            &CharTokenizer,
        )
        .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "abc");
    }

    #[test]
    fn empty_inputs_yield_no_chunks() {
        for strategy in [
            ChunkingStrategy::TokenWindow,
            ChunkingStrategy::RecursiveSeparator,
            ChunkingStrategy::MarkdownHeader,
        ] {
            let none: [&str; 0] = [];
            assert!(
                chunk(none, strategy, params(4, 1), &CharTokenizer)
                    .unwrap()
                    .is_empty()
            );
            assert!(
                chunk([""], strategy, params(4, 1), &CharTokenizer)
                    .unwrap()
                    .is_empty()
            );
        }
    }

    #[test]
    fn source_index_runs_across_inputs() {
        let chunks = chunk(
            ["abcdef", "ghij"],
            ChunkingStrategy::TokenWindow,
            params(4, 0),
            &CharTokenizer,
        )
        .unwrap();
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "ef", "ghij"]);
        assert_eq!(
            chunks.iter().map(|c| c.source_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn recursive_packs_words_up_to_budget() {
        let chunks = chunk(
            ["one two three four five"],
            ChunkingStrategy::RecursiveSeparator,
            params(2, 0),
            &WordTokenizer,
        )
        .unwrap();
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["one two", "three four", "five"]);
    }

    #[test]
    fn recursive_repeats_trailing_overlap() {
        let chunks = chunk(
            ["one two three four five"],
            ChunkingStrategy::RecursiveSeparator,
            params(3, 1),
            &WordTokenizer,
        )
        .unwrap();
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["one two three", "three four five"]);
        assert!(chunks.iter().all(|c| c.token_count <= 3));
    }

    #[test]
    fn recursive_prefers_paragraph_breaks() {
        let text = "alpha beta\n\ngamma delta\n\nepsilon";
        let chunks = chunk(
            [text],
            ChunkingStrategy::RecursiveSeparator,
            params(4, 0),
            &WordTokenizer,
        )
        .unwrap();
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["alpha beta\n\ngamma delta", "epsilon"]);
    }

    #[test]
    fn recursive_descends_to_smaller_separators_for_oversized_paragraphs() {
        let text = "a b c d e f\n\ng";
        let chunks = chunk(
            [text],
            ChunkingStrategy::RecursiveSeparator,
            params(3, 0),
            &WordTokenizer,
        )
        .unwrap();
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["a b c", "d e f", "g"]);
    }

    #[test]
    fn recursive_hard_slices_unbroken_text() {
        let text = "abcdefghij";
        let chunks = chunk(
            [text],
            ChunkingStrategy::RecursiveSeparator,
            params(4, 1),
            &CharTokenizer,
        )
        .unwrap();
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "defg", "ghij"]);
        assert!(chunks.iter().all(|c| c.token_count <= 4));
    }

    #[test]
    fn recursive_strips_whitespace_and_drops_blank_chunks() {
        let chunks = chunk(
            ["   \n\n  hello   world  \n\n   "],
            ChunkingStrategy::RecursiveSeparator,
            params(8, 0),
            &WordTokenizer,
        )
        .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello   world");
    }

    #[test]
    fn recursive_respects_tiktoken_budget() {
        let tokenizer = TiktokenTokenizer::for_model("text-embedding-3-small").unwrap();
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(20);
        let chunks = chunk(
            [text.as_str()],
            ChunkingStrategy::RecursiveSeparator,
            params(16, 4),
            &tokenizer,
        )
        .unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.token_count <= 16, "{chunk:?}");
            assert!(!chunk.text.trim().is_empty());
        }
    }

    fn path(title: Option<&str>, section: Option<&str>, subsection: Option<&str>) -> HeaderPath {
        HeaderPath {
            title: title.map(str::to_string),
            section: section.map(str::to_string),
            subsection: subsection.map(str::to_string),
        }
    }

    #[test]
    fn markdown_tracks_nested_headers_and_drops_header_lines() {
        let text = "# Paper\nintro text\n## Methods\nmethod text\n### Data\ndata text\n\
                    #### Detail\ndetail text\n## Results\nresult text\n# Appendix\nappendix text";
        let chunks = chunk(
            [text],
            ChunkingStrategy::MarkdownHeader,
            params(50, 0),
            &WordTokenizer,
        )
        .unwrap();

        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "intro text",
                "method text",
                "data text\n#### Detail\ndetail text",
                "result text",
                "appendix text",
            ]
        );
        let headers: Vec<_> = chunks.iter().map(|c| c.headers.clone()).collect();
        assert_eq!(
            headers,
            vec![
                path(Some("Paper"), None, None),
                path(Some("Paper"), Some("Methods"), None),
                path(Some("Paper"), Some("Methods"), Some("Data")),
                path(Some("Paper"), Some("Results"), None),
                path(Some("Appendix"), None, None),
            ]
        );
        assert_eq!(
            chunks.iter().map(|c| c.source_index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4]
        );
    }

    #[test]
    fn markdown_text_before_first_header_has_no_headers() {
        let chunks = chunk(
            ["Abstract first.\n\n# Intro\nbody text"],
            ChunkingStrategy::MarkdownHeader,
            params(50, 0),
            &WordTokenizer,
        )
        .unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "Abstract first.");
        assert!(chunks[0].headers.is_empty());
        assert_eq!(chunks[1].text, "body text");
        assert_eq!(chunks[1].headers, path(Some("Intro"), None, None));
    }

    #[test]
    fn markdown_ignores_headers_inside_code_fences() {
        let chunks = chunk(
            ["# Setup\n```sh\n# not a header\n```\nafter"],
            ChunkingStrategy::MarkdownHeader,
            params(50, 0),
            &WordTokenizer,
        )
        .unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "```sh\n# not a header\n```\nafter");
        assert_eq!(chunks[0].headers, path(Some("Setup"), None, None));
    }

    #[test]
    fn markdown_sections_respect_token_budget() {
        let chunks = chunk(
            ["## Long\none two three four five"],
            ChunkingStrategy::MarkdownHeader,
            params(2, 0),
            &WordTokenizer,
        )
        .unwrap();

        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["one two", "three four", "five"]);
        assert!(
            chunks
                .iter()
                .all(|c| c.headers == path(None, Some("Long"), None))
        );
    }

    #[test]
    fn other_strategies_leave_headers_empty() {
        for strategy in [
            ChunkingStrategy::TokenWindow,
            ChunkingStrategy::RecursiveSeparator,
        ] {
            let chunks = chunk(["# Title\nbody"], strategy, params(50, 0), &CharTokenizer).unwrap();
            assert!(!chunks.is_empty());
            assert!(chunks.iter().all(|c| c.headers.is_empty()));
        }
    }
}
