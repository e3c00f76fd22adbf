//! Semantic word counting for markdown post bodies.
//!
//! Markdown syntax is stripped first so that URLs, code and markup do not
//! inflate the count. Han ideographs count one per character; runs of ASCII
//! letters and digits (optionally with one internal apostrophe) count one per
//! run.

use std::sync::LazyLock;

use regex::Regex;

fn compile(pattern: &str) -> Regex {
  Regex::new(pattern).expect("word-count patterns are valid")
}

static FENCED_CODE: LazyLock<Regex> = LazyLock::new(|| compile(r"```[\s\S]*?```"));
static INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| compile(r"`[^`\n]*`"));
static IMAGE: LazyLock<Regex> = LazyLock::new(|| compile(r"!\[[^\]]*\]\([^)]*\)"));
static LINK: LazyLock<Regex> = LazyLock::new(|| compile(r"\[([^\]]*)\]\([^)]*\)"));
static HEADING: LazyLock<Regex> = LazyLock::new(|| compile(r"(?m)^[ \t]*#{1,6}[ \t]+"));
static LIST_ITEM: LazyLock<Regex> =
  LazyLock::new(|| compile(r"(?m)^[ \t]*(?:[-*+]|\d+\.)[ \t]+"));
static BLOCKQUOTE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?m)^[ \t]*(?:>[ \t]?)+"));
static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| compile(r"[*_~]{1,3}"));
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| compile(r"<[^>]+>"));

static HAN: LazyLock<Regex> = LazyLock::new(|| compile(r"\p{Han}"));
static LATIN_WORD: LazyLock<Regex> =
  LazyLock::new(|| compile(r"[A-Za-z0-9]+(?:'[A-Za-z0-9]+)?"));

/// Remove markdown syntax, keeping the readable text.
///
/// Order matters: code is removed before links so that bracketed code is not
/// mistaken for a link, and images before links for the same reason.
pub fn strip_markdown(text: &str) -> String {
  let text = FENCED_CODE.replace_all(text, " ");
  let text = INLINE_CODE.replace_all(&text, " ");
  let text = IMAGE.replace_all(&text, " ");
  let text = LINK.replace_all(&text, "$1");
  let text = HEADING.replace_all(&text, "");
  let text = LIST_ITEM.replace_all(&text, "");
  let text = BLOCKQUOTE.replace_all(&text, "");
  let text = EMPHASIS.replace_all(&text, "");
  HTML_TAG.replace_all(&text, " ").into_owned()
}

/// Count semantic words in a markdown body. Empty input yields 0.
pub fn count_words(text: &str) -> u64 {
  if text.trim().is_empty() {
    return 0;
  }
  let plain = strip_markdown(text);
  let han = HAN.find_iter(&plain).count();
  let latin = LATIN_WORD.find_iter(&plain).count();
  (han + latin) as u64
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_input_is_zero() {
    assert_eq!(count_words(""), 0);
    assert_eq!(count_words("   \n\t"), 0);
  }

  #[test]
  fn mixed_latin_and_han() {
    assert_eq!(count_words("Hello, 世界!"), 3);
    assert_eq!(count_words("Rust编程语言"), 5);
  }

  #[test]
  fn is_deterministic() {
    let body = "# Notes\n\nSome *text* with [a link](https://example.com) 和中文.";
    assert_eq!(count_words(body), count_words(body));
  }

  #[test]
  fn fenced_code_only_counts_nothing() {
    assert_eq!(count_words("```code block```"), 0);
    assert_eq!(count_words("```rust\nfn main() { println!(\"hi\"); }\n```"), 0);
  }

  #[test]
  fn inline_code_is_removed() {
    assert_eq!(count_words("use `let x = 1` here"), 2);
  }

  #[test]
  fn links_keep_their_text_and_images_vanish() {
    assert_eq!(count_words("[link text](http://example.com/a/b)"), 2);
    assert_eq!(count_words("![alt words](img.png) caption"), 1);
  }

  #[test]
  fn block_markers_are_not_words() {
    let body = "# Title\n\n- item one\n1. second\n> quoted line";
    assert_eq!(count_words(body), 6);
  }

  #[test]
  fn emphasis_and_html_are_stripped() {
    assert_eq!(count_words("**bold** and _italic_"), 3);
    assert_eq!(count_words("<p>Hello</p><br/>world"), 2);
  }

  #[test]
  fn apostrophes_stay_inside_a_word() {
    assert_eq!(count_words("don't stop"), 2);
    assert_eq!(count_words("rock 'n' roll"), 3);
  }
}
