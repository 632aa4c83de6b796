//! End-to-end check that a `.mref` written to disk, a `.mrkl` opened
//! against it, and a sequence of verified writes agree with each other —
//! the non-async half of spec §8's round-trip property (invariant 5).

use mafc_core::codec::mref;
use mafc_core::test_support::build_ref;
use mafc_core::{MerkleRef, MerkleShape, MerkleState};

#[test]
fn mref_file_round_trips_and_drives_a_fresh_mrkl() {
    let dir = tempfile::tempdir().unwrap();
    let chunk_size = MerkleShape::with_chunk_size(0, 1 << 20).chunk_size();
    let content = vec![42u8; 7 * chunk_size as usize + 123];

    let built = build_ref(&content, chunk_size);
    let mref_path = dir.path().join("data.fvec.mref");
    std::fs::write(&mref_path, mref::encode(&built)).unwrap();

    let loaded = MerkleRef::load(&mref_path).unwrap();
    assert_eq!(loaded.root_hash(), built.root_hash());
    loaded.validate().unwrap();

    let mrkl_path = dir.path().join("data.fvec.mrkl");
    let mut state = MerkleState::open_or_create(&mrkl_path, &loaded).unwrap();

    for i in 0..loaded.shape().leaf_count() {
        let (start, end) = loaded.shape().chunk_boundary(i).unwrap();
        let bytes = &content[start as usize..end as usize];
        assert!(loaded.verify_chunk(i, bytes).unwrap());
        state.mark_valid(i).unwrap();
    }
    state.close().unwrap();

    let reopened = MerkleState::open_or_create(&mrkl_path, &loaded).unwrap();
    for i in 0..loaded.shape().leaf_count() {
        assert!(reopened.is_valid(i));
    }
}

#[test]
fn hash_mismatch_is_isolated_to_the_offending_chunk() {
    let chunk_size = 1 << 20;
    let content = vec![1u8; 3 * chunk_size as usize];
    let r = build_ref(&content, chunk_size);

    let mut tampered = content.clone();
    tampered[chunk_size as usize] ^= 0xFF; // corrupt chunk 1 only

    assert!(r
        .verify_chunk(0, &content[0..chunk_size as usize])
        .unwrap());
    assert!(!r
        .verify_chunk(1, &tampered[chunk_size as usize..2 * chunk_size as usize])
        .unwrap());
    assert!(r
        .verify_chunk(
            2,
            &content[2 * chunk_size as usize..3 * chunk_size as usize]
        )
        .unwrap());
}
