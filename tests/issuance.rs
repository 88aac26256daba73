//! Tests for issuing (building and signing) mdocs

use assert_let_bind::assert_let;
use test_utils::issuer::{Provider, AAMVA_NAME_SPACE, DOC_TYPE, NAME_SPACE};
use test_utils::store::keystore::{ISSUER_ID, ISSUER_KEY_1};
use test_utils::{holder, sample};
use vercre_mdoc::{DeviceSigned, DigestAlgorithm, Error, MDoc, MDocBuilder};

static PROVIDER: Provider = Provider::new();

fn builder() -> MDocBuilder {
    let mut builder = MDocBuilder::new(DOC_TYPE);
    builder.add_dataset(sample::dataset()).expect("should add dataset");
    builder
}

fn sign(builder: &MDocBuilder, key_id: Option<&str>) -> vercre_mdoc::Result<MDoc> {
    builder.sign(
        &PROVIDER,
        sample::validity_info(),
        holder::device_key_info(),
        DeviceSigned::default(),
        key_id,
    )
}

// Should sign a dataset and verify it with the same provider.
#[test]
fn sign_and_verify() {
    test_utils::init_tracer();

    let mdoc = sign(&builder(), None).expect("should sign");
    assert_eq!(mdoc.doc_type, DOC_TYPE);
    assert_eq!(mdoc.issuer_signed_items(NAME_SPACE).len(), 6);
    assert_eq!(mdoc.issuer_signed_items(AAMVA_NAME_SPACE).len(), 2);

    assert!(mdoc.verify_issuer_signed_items().expect("should verify items"));
    assert!(mdoc.verify(&PROVIDER, None).expect("should verify"));
    assert!(mdoc.verify_doc_type().expect("should check doc type"));

    // MSO covers every item, keyed by its digest ID
    let mso = mdoc.mso().expect("should parse").expect("should have MSO");
    assert_eq!(mso.digest_algorithm, DigestAlgorithm::Sha256);
    assert_eq!(mso.device_key_info, holder::device_key_info());
    for name_space in mdoc.name_spaces() {
        let items = mdoc.issuer_signed_items(name_space);
        let ids: Vec<_> = items.iter().map(|i| i.digest_id).collect();
        let digests: Vec<_> = mso.value_digests[name_space].keys().copied().collect();
        assert_eq!(ids, (0..ids.len() as u64).collect::<Vec<_>>());
        assert_eq!(digests, ids);
    }
}

// Should sign asynchronously with the same result as blocking signing.
#[tokio::test]
async fn sign_async() {
    test_utils::init_tracer();

    let mdoc = builder()
        .sign_async(
            &PROVIDER,
            sample::validity_info(),
            holder::device_key_info(),
            DeviceSigned::default(),
            None,
        )
        .await
        .expect("should sign");
    assert!(mdoc.verify(&PROVIDER, None).expect("should verify"));
}

// Should sign independent builders concurrently.
#[tokio::test]
async fn sign_async_concurrently() {
    test_utils::init_tracer();

    let mut other = MDocBuilder::new(DOC_TYPE);
    other.add_item(NAME_SPACE, "given_name", "Other").expect("should add item");
    let first = builder();

    let sign_async = |builder: &MDocBuilder| {
        let builder = builder.clone();
        async move {
            builder
                .sign_async(
                    &PROVIDER,
                    sample::validity_info(),
                    holder::device_key_info(),
                    DeviceSigned::default(),
                    Some(ISSUER_KEY_1),
                )
                .await
        }
    };
    let (a, b) = tokio::join!(sign_async(&first), sign_async(&other));

    let a = a.expect("should sign");
    let b = b.expect("should sign");
    assert!(a.verify(&PROVIDER, Some(ISSUER_KEY_1)).expect("should verify"));
    assert!(b.verify(&PROVIDER, Some(ISSUER_KEY_1)).expect("should verify"));
    assert_eq!(b.issuer_signed_items(NAME_SPACE).len(), 1);
}

// Should sign with the selected key and record it in the unprotected header.
#[test]
fn key_selection() {
    test_utils::init_tracer();

    let mdoc = sign(&builder(), Some(ISSUER_KEY_1)).expect("should sign");

    let sign1 = mdoc.issuer_signed.issuer_auth.to_cose_sign1().expect("should parse");
    assert_eq!(sign1.unprotected.key_id, format!("{ISSUER_ID}#{ISSUER_KEY_1}").into_bytes());

    assert!(mdoc.verify(&PROVIDER, Some(ISSUER_KEY_1)).expect("should verify"));
    assert!(!mdoc.verify(&PROVIDER, None).expect("should verify"));
}

// Should return the signer's error unchanged.
#[test]
fn unknown_key() {
    test_utils::init_tracer();

    let err = sign(&builder(), Some("key-9")).expect_err("should fail");
    assert_eq!(err.to_string(), "key not found: key-9");
    assert_let!(Some(provider_err), err.provider_error());
    assert_eq!(provider_err.to_string(), "key not found: key-9");
}

// Should leave the builder unchanged when signing, so each call produces an
// independent document over the same claims.
#[test]
fn repeat_signing() {
    test_utils::init_tracer();

    let mut builder = builder();
    let first = sign(&builder, None).expect("should sign");
    let second = sign(&builder, None).expect("should sign");
    assert_eq!(first.issuer_signed.name_spaces, second.issuer_signed.name_spaces);

    builder.add_item(NAME_SPACE, "portrait", vec![0xff_u8, 0xd8]).expect("should add item");
    let third = sign(&builder, None).expect("should sign");

    assert_eq!(first.issuer_signed_items(NAME_SPACE).len(), 6);
    let items = third.issuer_signed_items(NAME_SPACE);
    assert_eq!(items.len(), 7);
    assert_eq!(items[6].digest_id, 6);

    for mdoc in [first, second, third] {
        assert!(mdoc.verify(&PROVIDER, None).expect("should verify"));
    }
}

// Should re-issue previously signed items without changing their digests.
#[test]
fn reissue() {
    test_utils::init_tracer();

    let original = sign(&builder(), None).expect("should sign");
    let name_spaces = original.issuer_signed.name_spaces.clone().expect("should have items");

    let mut builder = MDocBuilder::new(DOC_TYPE);
    for (name_space, items) in name_spaces {
        builder.add_pre_built_items(name_space, items);
    }
    builder.add_item(NAME_SPACE, "resident_city", "Wellington").expect("should add item");

    let reissued = sign(&builder, Some(ISSUER_KEY_1)).expect("should sign");
    assert!(reissued.verify(&PROVIDER, Some(ISSUER_KEY_1)).expect("should verify"));

    let old_mso = original.mso().expect("should parse").expect("should have MSO");
    let new_mso = reissued.mso().expect("should parse").expect("should have MSO");
    for (digest_id, digest) in &old_mso.value_digests[NAME_SPACE] {
        assert_eq!(&new_mso.value_digests[NAME_SPACE][digest_id], digest);
    }
    assert!(new_mso.value_digests[NAME_SPACE].contains_key(&6));
}

// Should survive encoding to base64url and back.
#[test]
fn base64url_roundtrip() {
    test_utils::init_tracer();

    let mdoc = sign(&builder(), None).expect("should sign");
    let encoded = mdoc.to_base64url().expect("should encode");

    let decoded = MDoc::from_base64url(&encoded).expect("should decode");
    assert_eq!(decoded, mdoc);
    assert!(decoded.verify(&PROVIDER, None).expect("should verify"));
}

// Should omit name spaces when no claims are added.
#[test]
fn no_claims() {
    test_utils::init_tracer();

    let mdoc = sign(&MDocBuilder::new(DOC_TYPE), None).expect("should sign");
    assert!(mdoc.issuer_signed.name_spaces.is_none());
    assert!(mdoc.verify(&PROVIDER, None).expect("should verify"));
}

// Should reject a dataset whose name space is not an object.
#[test]
fn invalid_dataset() {
    let mut dataset = sample::dataset();
    dataset.insert("org.example.flat".into(), serde_json::json!("value"));

    let mut builder = MDocBuilder::new(DOC_TYPE);
    assert_let!(Err(Error::Encoding(_)), builder.add_dataset(dataset));
}
