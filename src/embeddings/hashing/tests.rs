use super::*;

fn norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

#[test]
fn produces_configured_dimension() {
    let embedder = HashingEmbedder::new(32);
    let vectors = embedder
        .embed(&["gin fizz".to_string(), "whiskey sour".to_string()])
        .expect("should embed");

    assert_eq!(vectors.len(), 2);
    assert!(vectors.iter().all(|v| v.len() == 32));
    assert_eq!(embedder.dimension(), 32);
}

#[test]
fn output_is_unit_length() {
    let embedder = HashingEmbedder::new(64);
    let vector = embedder
        .embed_one("Shake gin, lemon juice and sugar with ice")
        .expect("should embed");
    assert!((norm(&vector) - 1.0).abs() < 1e-5);
}

#[test]
fn deterministic_across_instances() {
    let first = HashingEmbedder::new(48)
        .embed_one("Margarita tequila lime")
        .expect("should embed");
    let second = HashingEmbedder::new(48)
        .embed_one("Margarita tequila lime")
        .expect("should embed");
    assert_eq!(first, second);
}

#[test]
fn case_and_punctuation_are_ignored() {
    let embedder = HashingEmbedder::new(48);
    let a = embedder.embed_one("Gin, TONIC!").expect("should embed");
    let b = embedder.embed_one("gin tonic").expect("should embed");
    assert_eq!(a, b);
}

#[test]
fn text_without_tokens_is_rejected() {
    let embedder = HashingEmbedder::new(16);
    for text in ["", "  ,, ", "!!! ...", "?"] {
        let err = embedder.embed_one(text).expect_err("no tokens to hash");
        assert!(matches!(err, CocktailError::EmbeddingUnavailable(_)));
    }
    assert!(!has_tokens("!!! ..."));
    assert!(has_tokens("!!! gin"));
}

#[test]
fn one_token_free_text_fails_the_batch() {
    let embedder = HashingEmbedder::new(16);
    let err = embedder
        .embed(&["gin fizz".to_string(), "---".to_string()])
        .expect_err("second text has no tokens");
    assert!(matches!(err, CocktailError::EmbeddingUnavailable(_)));
}

#[test]
fn zero_dimension_is_clamped() {
    assert_eq!(HashingEmbedder::new(0).dimension(), 1);
}

#[test]
fn fnv1a_reference_values() {
    assert_eq!(fnv1a(b""), FNV_OFFSET_BASIS);
    assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
}
