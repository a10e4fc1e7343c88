//! Link graph walks over stored blocks.

use std::sync::Arc;

use cairn_block::{Block, FileBuilder, Link};
use cairn_core::{CairnError, CryptoConfig, DigestAlgorithm, Fingerprint};
use cairn_crypto::{CipherSpec, Keychain, SecretKey};
use cairn_store::{Fetcher, Store};

fn leaf(content: &[u8]) -> Block {
    Block::builder().content(content).build().unwrap()
}

fn parent(content: &[u8], children: &[&Block]) -> Block {
    Block::builder()
        .content(content)
        .links(children.iter().map(|c| c.link()))
        .build()
        .unwrap()
}

#[test]
fn walks_plaintext_dag() {
    let store = Arc::new(Store::memory());
    let b = leaf(b"child");
    let a = parent(b"root ", &[&b]);
    store.store_all([&a, &b]).unwrap();

    let result = Fetcher::new(store).fetch(&a.link()).unwrap();
    assert_eq!(result.plaintext_names(), vec![a.name(), b.name()]);
    assert_eq!(result.block(a.name()), Some(&a));
    assert_eq!(result.block(b.name()), Some(&b));
    assert_eq!(result.encrypted_blobs().count(), 0);
    assert_eq!(result.assemble(a.name()).unwrap(), b"root child");
}

#[test]
fn wrong_key_yields_opaque_blob_without_error() {
    let store = Arc::new(Store::memory());
    let c = leaf(b"confidential");
    let encrypted = c.encrypt(&CryptoConfig::default()).unwrap();
    store.store_encrypted(&encrypted).unwrap();

    let wrong = Link::builder()
        .target(encrypted.name())
        .decryption("AES/CTR/NoPadding", vec![0x42; 16], Vec::new())
        .build()
        .unwrap();
    let result = Fetcher::new(store).fetch(&wrong).unwrap();

    let name = encrypted.name().encode();
    assert!(result.block(&name).is_none());
    assert!(result.plaintext_blocks().next().is_none());
    assert_eq!(&result.blob(&name).unwrap()[..], encrypted.ciphertext());
}

#[test]
fn one_bad_key_does_not_abort_the_walk() {
    let store = Arc::new(Store::memory());
    let config = CryptoConfig::default();
    let open_leaf = leaf(b"readable");
    let locked_leaf = leaf(b"locked");
    let locked = locked_leaf.encrypt(&config).unwrap();
    let root = Block::builder()
        .link(open_leaf.link())
        .link(Link::to(locked.name()))
        .build()
        .unwrap();
    store.store_all([&root, &open_leaf]).unwrap();
    store.store_encrypted(&locked).unwrap();

    let result = Fetcher::new(store).fetch(&root.link()).unwrap();
    let locked_name = locked.name().encode();
    assert_eq!(result.plaintext_names(), vec![root.name(), open_leaf.name()]);
    assert_eq!(result.opaque_names(), vec![locked_name.as_str()]);
}

#[test]
fn keychain_opens_nodes_the_link_cannot() {
    let store = Arc::new(Store::memory());
    let config = CryptoConfig::default();
    let secret = leaf(b"from the keychain");
    let encrypted = secret.encrypt(&config).unwrap();
    store.store_encrypted(&encrypted).unwrap();

    let key_bytes = encrypted.link().decryption().unwrap().key().to_vec();
    let keychain = Keychain::new();
    keychain.insert(
        encrypted.name().clone(),
        SecretKey::new(CipherSpec::default(), key_bytes, DigestAlgorithm::Sha256),
    );

    let result = Fetcher::new(store)
        .with_keys(Arc::new(keychain))
        .fetch(&Link::to(encrypted.name()))
        .unwrap();
    assert_eq!(result.block(&encrypted.name().encode()), Some(&secret));
}

#[test]
fn shared_child_is_resolved_once() {
    let store = Arc::new(Store::memory());
    let shared = leaf(b"shared");
    let left = parent(b"L", &[&shared]);
    let right = parent(b"R", &[&shared]);
    let root = parent(b"", &[&left, &right]);
    store.store_all([&root, &left, &right, &shared]).unwrap();

    let result = Fetcher::new(store).fetch(&root.link()).unwrap();
    assert_eq!(result.len(), 4);
    assert_eq!(
        result.plaintext_names(),
        vec![root.name(), left.name(), shared.name(), right.name()]
    );
    assert_eq!(result.assemble(root.name()).unwrap(), b"LsharedRshared");
}

#[test]
fn cyclic_graph_terminates() {
    let store = Arc::new(Store::memory());
    let to = |uri: &str| Link::builder().uri(uri).build().unwrap();
    let a = Block::builder().content(b"a").link(to("node-b")).build().unwrap();
    let b = Block::builder().content(b"b").link(to("node-a")).build().unwrap();
    store.store_bytes("node-a", a.bytes()).unwrap();
    store.store_bytes("node-b", b.bytes()).unwrap();

    let result = Fetcher::new(store).fetch(&to("node-a")).unwrap();
    assert_eq!(result.plaintext_names(), vec!["node-a", "node-b"]);
    assert!(matches!(
        result.assemble("node-a"),
        Err(CairnError::InvalidArgument(_))
    ));
}

#[test]
fn depth_limit_fires_when_crossed() {
    let store = Arc::new(Store::memory());
    let c = leaf(b"c");
    let b = parent(b"b", &[&c]);
    let a = parent(b"a", &[&b]);
    store.store_all([&a, &b, &c]).unwrap();

    let fetcher = Fetcher::new(Arc::clone(&store)).max_depth(1);
    assert!(matches!(
        fetcher.fetch(&a.link()),
        Err(CairnError::DepthExceeded { limit: 1 })
    ));

    let fetcher = Fetcher::new(store).max_depth(2);
    assert_eq!(fetcher.fetch(&a.link()).unwrap().len(), 3);
}

#[test]
fn depth_limit_uses_shortest_path() {
    let store = Arc::new(Store::memory());
    let c = leaf(b"c");
    let b = parent(b"b", &[&c]);
    let a = parent(b"a", &[&b]);
    let root = parent(b"root", &[&a, &c]);
    store.store_all([&root, &a, &b, &c]).unwrap();

    // c is met at depth 3 under a/b before its direct link at depth 1.
    let result = Fetcher::new(Arc::clone(&store))
        .max_depth(2)
        .fetch(&root.link())
        .unwrap();
    assert_eq!(result.len(), 4);

    assert!(matches!(
        Fetcher::new(store).max_depth(1).fetch(&root.link()),
        Err(CairnError::DepthExceeded { limit: 1 })
    ));
}

#[test]
fn shorter_path_reopens_grandchildren_within_limit() {
    let store = Arc::new(Store::memory());
    let d = leaf(b"d");
    let c = parent(b"c", &[&d]);
    let b = parent(b"b", &[&c]);
    let a = parent(b"a", &[&b]);
    let root = parent(b"root", &[&a, &c]);
    store.store_all([&root, &a, &b, &c, &d]).unwrap();

    // Down a/b, c sits at depth 3 and d at 4; through root, d is at 2.
    let result = Fetcher::new(store)
        .max_depth(3)
        .fetch(&root.link())
        .unwrap();
    assert_eq!(result.len(), 5);
    assert!(result.contains(d.name()));
    assert_eq!(result.plaintext_names(), vec![root.name(), a.name(), b.name(), c.name(), d.name()]);
}

#[test]
fn substituted_bytes_fail_integrity() {
    let store = Arc::new(Store::memory());
    let genuine = leaf(b"genuine");
    let forged = leaf(b"forged");
    store.store_bytes(genuine.name(), forged.bytes()).unwrap();

    let err = Fetcher::new(store).fetch(&genuine.link()).unwrap_err();
    assert!(matches!(err, CairnError::Integrity { ref name } if name == genuine.name()));
}

#[test]
fn missing_child_propagates_no_such_block() {
    let store = Arc::new(Store::memory());
    let absent = leaf(b"absent");
    let root = parent(b"root", &[&absent]);
    store.store_block(&root).unwrap();

    let err = Fetcher::new(store).fetch(&root.link()).unwrap_err();
    assert!(matches!(err, CairnError::NoSuchBlock { ref name } if name == absent.name()));
}

#[test]
fn chunked_files_round_trip_through_fetch() {
    let data: Vec<u8> = (0..50_000u32)
        .map(|i| (i.wrapping_mul(2_654_435_761) >> 11) as u8)
        .collect();
    for encrypt in [false, true] {
        let store = Arc::new(Store::memory());
        let file = FileBuilder::new(CryptoConfig::default())
            .block_size(512)
            .encrypted(encrypt)
            .build(&data)
            .unwrap();
        store.store_file(&file).unwrap();

        let result = Fetcher::new(store).fetch(&file.root).unwrap();
        assert!(!result.is_empty() && result.len() <= file.len());
        assert!(result.encrypted_blobs().next().is_none());
        assert_eq!(result.assemble(file.root.target()).unwrap(), data, "encrypt={encrypt}");
    }
}

#[test]
fn encrypted_root_without_key_is_opaque() {
    let store = Arc::new(Store::memory());
    let file = FileBuilder::new(CryptoConfig::default())
        .encrypted(true)
        .build(b"a short secret file")
        .unwrap();
    store.store_file(&file).unwrap();

    let bare = Link::to(&Fingerprint::decode(file.root.target()).unwrap());
    let result = Fetcher::new(store).fetch(&bare).unwrap();
    assert_eq!(result.opaque_names(), vec![file.root.target()]);
}
