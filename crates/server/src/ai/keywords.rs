//! Keyword extraction for ranking.
//!
//! Text is split on non-alphanumerics, lowercased and stripped of English
//! stop words using tantivy's analyzers. Tantivy's list only covers
//! articles and prepositions, so [`SHOPPER_STOP_WORDS`] adds the pronouns,
//! auxiliaries and request phrasing shoppers type around the product words. Each remaining word is reduced with
//! the English stemmer only when the stem is a prefix of the word
//! (`dresses` -> `dress`, but `navy` stays `navy`), so keywords remain
//! substrings of the catalog text they should match.

use std::collections::BTreeSet;

use tantivy::tokenizer::{
    Language, LowerCaser, RawTokenizer, RemoveLongFilter, SimpleTokenizer, Stemmer,
    StopWordFilter, TextAnalyzer, TokenStream,
};

/// Words longer than this are dropped (URLs, base64 noise).
const MAX_TOKEN_LEN: usize = 40;

/// Conversational words that never describe a product.
///
/// Matching is by substring, so short words here matter most: `me` would
/// otherwise hit `men`, `women` and `summer`.
pub const SHOPPER_STOP_WORDS: &[&str] = &[
    // Pronouns and determiners
    "i", "me", "my", "mine", "myself", "we", "us", "our", "ours", "you", "your", "yours",
    "he", "him", "his", "she", "her", "hers", "it", "its", "they", "them", "their", "theirs",
    "this", "that", "these", "those", "what", "which", "who", "whom", "whose", "some", "any",
    "something", "anything", "everything", "one", "ones", "all", "each", "every", "other",
    "another", "same", "such", "own",
    // Auxiliaries and modals
    "am", "is", "are", "was", "were", "be", "been", "being", "do", "does", "did", "doing",
    "have", "has", "had", "having", "can", "could", "would", "should", "shall", "will", "may",
    "might", "must",
    // Request phrasing
    "please", "show", "find", "give", "get", "want", "wanted", "need", "needs", "like",
    "looking", "look", "search", "searching", "buy", "help", "recommend", "suggest", "thing",
    "things", "kind", "sort", "type", "similar", "maybe", "thanks", "thank",
    // Connectives and fillers
    "about", "above", "after", "again", "also", "just", "only", "very", "too", "so", "than",
    "then", "there", "here", "where", "when", "why", "how", "more", "most", "much", "many",
    "up", "down", "out", "off", "over", "under", "from", "with", "without", "into", "onto",
    "of", "by", "if", "or", "nor", "not", "no", "yes", "ok", "okay", "go", "going", "well",
];

/// Extract a deduplicated, sorted keyword set from free text.
///
/// Single characters and pure numbers are dropped.
///
/// ```
/// use shopsmarter_server::ai::keywords::extract_keywords;
///
/// let keywords = extract_keywords("Looking for the red summer dresses");
/// assert!(keywords.contains("dress"));
/// assert!(keywords.contains("red"));
/// assert!(!keywords.contains("the"));
/// ```
#[must_use]
pub fn extract_keywords(text: &str) -> BTreeSet<String> {
    let mut keywords = BTreeSet::new();
    if text.trim().is_empty() {
        return keywords;
    }

    let mut words = word_analyzer();
    let mut stemmer = stem_analyzer();

    let mut stream = words.token_stream(text);
    while stream.advance() {
        let word = stream.token().text.as_str();
        if word.chars().count() < 2 || word.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        keywords.insert(reduce(&mut stemmer, word));
    }

    keywords
}

/// Extract keywords from several texts into one set.
#[must_use]
pub fn extract_all<'a, I>(texts: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    texts.into_iter().flat_map(extract_keywords).collect()
}

fn word_analyzer() -> TextAnalyzer {
    let stop_words = StopWordFilter::new(Language::English)
        .unwrap_or_else(|| StopWordFilter::remove(Vec::<String>::new()));

    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
        .filter(LowerCaser)
        .filter(stop_words)
        .filter(StopWordFilter::remove(
            SHOPPER_STOP_WORDS.iter().map(|w| (*w).to_string()),
        ))
        .build()
}

fn stem_analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(RawTokenizer::default())
        .filter(Stemmer::new(Language::English))
        .build()
}

/// Stem a word, keeping the original unless the stem is a prefix of it.
fn reduce(stemmer: &mut TextAnalyzer, word: &str) -> String {
    let mut stream = stemmer.token_stream(word);
    let stem = if stream.advance() {
        stream.token().text.clone()
    } else {
        String::new()
    };

    if stem.len() >= 2 && word.starts_with(&stem) {
        stem
    } else {
        word.to_owned()
    }
}
