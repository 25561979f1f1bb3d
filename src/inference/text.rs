/// Joins contractions and punctuation the way the reference tokenizers do
/// after decoding, then strips sentencepiece markers and outer whitespace.
pub fn clean_decoded_text(text: &str) -> String {
    let tidy = tidy_decoded_text(text);
    clean_up_tokenization_spaces(&tidy).trim().to_string()
}

fn tidy_decoded_text(text: &str) -> String {
    text.replace('\u{2581}', " ")
        .replace('\u{200b}', "")
        .replace("<pad>", "")
        .replace("</s>", "")
}

fn clean_up_tokenization_spaces(text: &str) -> String {
    text.replace(" .", ".")
        .replace(" ?", "?")
        .replace(" !", "!")
        .replace(" ,", ",")
        .replace(" ' ", "'")
        .replace(" n't", "n't")
        .replace(" 'm", "'m")
        .replace(" 's", "'s")
        .replace(" 've", "'ve")
        .replace(" 're", "'re")
}
