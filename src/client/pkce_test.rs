use super::*;

#[test]
fn challenge_matches_rfc7636_example() {
    // Appendix B of RFC 7636.
    let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    assert_eq!(challenge_for(verifier), "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
}

#[test]
fn generated_verifier_has_pkce_length_and_alphabet() {
    let pair = PkcePair::generate();
    assert_eq!(pair.verifier.len(), 43);
    assert!(
        pair.verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    );
}

#[test]
fn generated_challenge_derives_from_verifier() {
    let pair = PkcePair::generate();
    assert_eq!(pair.challenge, challenge_for(&pair.verifier));
    assert_ne!(pair.challenge, pair.verifier);
}

#[test]
fn two_pairs_differ() {
    let a = PkcePair::generate();
    let b = PkcePair::generate();
    assert_ne!(a.verifier, b.verifier);
}
