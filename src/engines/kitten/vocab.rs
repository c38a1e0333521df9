use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

/// Pad symbol, always id 0.
const PAD: char = '$';

const PUNCTUATION: &str = ";:,.!?¡¿—…\u{201C}«»\u{201D}\" ";

const LETTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

const IPA_LETTERS: &str = "ɑɐɒæɓʙβɔɕçɗɖðʤəɘɚɛɜɝɞɟʄɡɠɢʛɦɧħɥʜɨɪʝɭɬɫɮʟɱɯɰŋɳɲɴøɵɸθœɶʘɹɺɾɻʀʁɽʂʃʈʧʉʊʋⱱʌɣɤʍχʎʏʑʐʒʔʡʕʢǀǁǂǃˈˌːˑʼʴʰʱʲʷˠˤ˞↓↑→↗↘\u{2019}\u{0329}\u{2018}ᵻ";

/// Symbol table: pad, punctuation, ASCII letters, IPA letters, in that order.
/// The order is baked into the model weights.
static VOCAB: Lazy<HashMap<char, i64>> = Lazy::new(|| {
    std::iter::once(PAD)
        .chain(PUNCTUATION.chars())
        .chain(LETTERS.chars())
        .chain(IPA_LETTERS.chars())
        .enumerate()
        .map(|(i, c)| (c, i as i64))
        .collect()
});

static WORD_OR_MARK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\w+|[^\w\s]").expect("tokenizer regex"));

/// Token id for `ch`, or `None` if the model has no symbol for it.
pub fn char_to_id(ch: char) -> Option<i64> {
    VOCAB.get(&ch).copied()
}

/// Split IPA into words and single punctuation marks, joined by spaces.
///
/// `"hɛloʊ,wɜːld!"` becomes `"hɛloʊ , wɜːld !"`.
pub fn basic_english_tokenize(ipa: &str) -> String {
    WORD_OR_MARK
        .find_iter(ipa)
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Convert an IPA string to model input ids, wrapped in pad tokens.
///
/// Characters outside the symbol table are dropped.
pub fn ipa_to_ids(ipa: &str) -> Vec<i64> {
    let tokenized = basic_english_tokenize(ipa);
    let mut ids = Vec::with_capacity(tokenized.len() + 2);
    ids.push(0);
    ids.extend(tokenized.chars().filter_map(char_to_id));
    ids.push(0);
    ids
}
