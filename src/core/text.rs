//! OCR-derived text fingerprints and their trigram distance.

use std::collections::HashSet;

/// Distance reported when either fingerprint carries too little signal.
pub const MAX_DISTANCE: f64 = 10_000.0;

/// Default minimum word length kept in a fingerprint.
pub const DEFAULT_MIN_WORD_LEN: usize = 3;
/// Default minimum n-gram count required on both sides of a comparison.
pub const DEFAULT_MIN_NGRAMS: usize = 10;
/// Default n-gram length; trigrams work well for OCR output.
pub const DEFAULT_NGRAM_LEN: usize = 3;

/// Builds a fingerprint from raw OCR word tokens: words shorter than
/// `min_word_len` are dropped, the rest are space-joined in OCR order.
pub fn fingerprint(words: &[String], min_word_len: usize) -> String {
    words
        .iter()
        .filter(|w| w.chars().count() >= min_word_len)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Distance between two fingerprints over their n-gram sets.
///
/// Each fingerprint's unique words are split into non-overlapping chunks of
/// `ngram_len` characters; ragged tails shorter than 3 are dropped. Either
/// side having fewer than `min_ngrams` chunks yields [`MAX_DISTANCE`]
/// (insufficient signal); disjoint sets yield +infinity; otherwise the
/// distance is |symmetric difference| / |intersection|, zero only for
/// identical sets.
pub fn distance(a: &str, b: &str, min_ngrams: usize, ngram_len: usize) -> f64 {
    let ngrams_a = ngrams(a, ngram_len);
    let ngrams_b = ngrams(b, ngram_len);
    if ngrams_a.len() < min_ngrams || ngrams_b.len() < min_ngrams {
        return MAX_DISTANCE;
    }
    let shared = ngrams_a.intersection(&ngrams_b).count();
    if shared == 0 {
        return f64::INFINITY;
    }
    let different = ngrams_a.symmetric_difference(&ngrams_b).count();
    different as f64 / shared as f64
}

fn ngrams(fingerprint: &str, ngram_len: usize) -> HashSet<String> {
    let words: HashSet<&str> = fingerprint.split_whitespace().collect();
    let mut set = HashSet::new();
    for word in words {
        let chars: Vec<char> = word.chars().collect();
        for chunk in chars.chunks(ngram_len) {
            if chunk.len() > 2 {
                set.insert(chunk.iter().collect());
            }
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn fingerprint_drops_short_words() {
        let fp = fingerprint(&words("an overview of the results"), DEFAULT_MIN_WORD_LEN);
        assert_eq!(fp, "overview the results");
    }

    #[test]
    fn fingerprint_preserves_ocr_order() {
        let fp = fingerprint(&words("zebra apple mango"), DEFAULT_MIN_WORD_LEN);
        assert_eq!(fp, "zebra apple mango");
    }

    #[test]
    fn identical_fingerprints_have_zero_distance() {
        let fp = "measurement throughput latency baseline experiment";
        assert_eq!(distance(fp, fp, DEFAULT_MIN_NGRAMS, DEFAULT_NGRAM_LEN), 0.0);
    }

    #[test]
    fn short_fingerprints_hit_the_sentinel() {
        // Two words produce far fewer than ten trigrams.
        let a = "alpha beta";
        let b = "alpha beta";
        assert_eq!(distance(a, b, DEFAULT_MIN_NGRAMS, DEFAULT_NGRAM_LEN), MAX_DISTANCE);
    }

    #[test]
    fn disjoint_fingerprints_are_infinitely_far() {
        let a = "aaabbb cccddd eeefff ggghhh iiijjj kkklll";
        let b = "mmmnnn oooppp qqqrrr sssttt uuuvvv wwwxxx";
        assert!(distance(a, b, DEFAULT_MIN_NGRAMS, DEFAULT_NGRAM_LEN).is_infinite());
    }

    #[test]
    fn distance_counts_symmetric_difference_over_intersection() {
        // a: {aaa,bbb,ccc,ddd,eee,fff,ggg,hhh,iii,jjj}
        // b: same but jjj replaced with zzz.
        let a = "aaa bbb ccc ddd eee fff ggg hhh iii jjj";
        let b = "aaa bbb ccc ddd eee fff ggg hhh iii zzz";
        let d = distance(a, b, DEFAULT_MIN_NGRAMS, DEFAULT_NGRAM_LEN);
        // 2 differing trigrams over 9 shared.
        assert!((d - 2.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn ragged_tails_are_dropped() {
        // "abcde" yields "abc" and drops the 2-char tail "de".
        let set = ngrams("abcde", DEFAULT_NGRAM_LEN);
        assert_eq!(set.len(), 1);
        assert!(set.contains("abc"));
    }
}
