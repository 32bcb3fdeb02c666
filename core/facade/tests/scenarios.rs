//! End-to-end scenarios across chains, facade functions and keys.

use pipecrypt::{
    decode, digest, digest_file_hex, encode, encrypt, random_bytes, sign, verify, Base64Filter,
    Chain, Cipher, CipherFilter, CryptoExt, Digest, DigestFilter, Direction, Encoding, Error,
    FileIo, Key, MemoryIo, PipeIo,
};

const RSA_PKCS8: &str = include_str!("../../crypto/testdata/rsa_pkcs8.pem");
const RSA_PUBLIC: &str = include_str!("../../crypto/testdata/rsa_public.pem");
const EC_PKCS8: &str = include_str!("../../crypto/testdata/ec_pkcs8.pem");
const EC_PUBLIC: &str = include_str!("../../crypto/testdata/ec_public.pem");

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn test_hex_and_base64_known_answers() {
    init_logging();
    assert_eq!(
        encode(b"Hello, world!", Encoding::Hex).unwrap(),
        b"48656c6c6f2c20776f726c6421"
    );
    assert_eq!(
        encode(b"Hello, world!", Encoding::Base64).unwrap(),
        b"SGVsbG8sIHdvcmxkIQ=="
    );
    assert_eq!(
        decode(b"SGVsbG8sIHdvcmxkIQ", Encoding::Base64Url).unwrap(),
        b"Hello, world!"
    );
}

#[test]
fn test_sha256_known_answer() {
    init_logging();
    let value = digest(b"Hello, world!", &Digest::Sha256).unwrap();
    assert_eq!(value.len(), 32);
    assert_eq!(
        hex::encode(value),
        "315f5bdb76d078c43b8ac0064e4a0164612b1fce77c869345bfc94c75894edd3"
    );
}

#[test]
fn test_triple_des_descriptor() {
    let descriptor = Cipher::DesEde3Cbc.descriptor().unwrap();
    assert_eq!(descriptor.block_size(), 8);
    assert_eq!(descriptor.key_len(), 24);
    assert_eq!(descriptor.iv_len(), 8);
}

#[test]
fn test_pipe_pair_moves_exact_count() {
    init_logging();
    let (a, b) = PipeIo::pair(0, 0);
    let mut writer = Chain::new(a);
    let mut reader = Chain::new(b);

    let payload = random_bytes(4096).unwrap();
    assert_eq!(writer.write(&payload).unwrap(), 4096);

    let mut received = vec![0u8; 8192];
    assert_eq!(reader.read(&mut received).unwrap(), 4096);
    assert_eq!(&received[..4096], payload.as_slice());
}

#[test]
fn test_encrypt_base64_into_memory() {
    init_logging();
    let key = [0x11u8; 16];
    let iv = [0x22u8; 16];

    // cipher -> base64 -> memory
    let mut chain = Chain::new(
        CipherFilter::new(&Cipher::Aes128Cbc, &key, &iv, Direction::Encrypt).unwrap(),
    );
    chain.link(Base64Filter::new());
    let sink = chain.link(MemoryIo::new());
    assert_eq!(chain.to_string(), "cipher<->base64 encoding<->(memory buffer)");

    chain.puts("attack at dawn").unwrap();
    chain.flush().unwrap();
    let armored = chain.get_mut(sink).unwrap().take();

    let expected = encrypt(b"attack at dawn", &Cipher::Aes128Cbc, &key, &iv).unwrap();
    assert_eq!(armored, encode(&expected, Encoding::Base64).unwrap());

    // memory -> base64 -> cipher, read back
    let (mut back, head) = Chain::with_head(
        CipherFilter::new(&Cipher::Aes128Cbc, &key, &iv, Direction::Decrypt).unwrap(),
    );
    back.link(Base64Filter::new());
    back.link(MemoryIo::from(armored));
    let mut plain = Vec::new();
    back.read_to_end(&mut plain).unwrap();
    assert_eq!(plain, b"attack at dawn");
    back.get(head).unwrap().ensure_decrypt_success().unwrap();
}

#[test]
fn test_digest_tee_while_writing_file() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.bin");

    let (mut chain, md) = Chain::with_head(DigestFilter::new(Digest::Sha512));
    chain.link(FileIo::open(&path, "wb").unwrap());
    chain.puts("Hello, world!").unwrap();
    chain.flush().unwrap();
    let in_flight = chain.get_mut(md).unwrap().finalize().unwrap();
    assert_eq!(chain.close(), 2);

    assert_eq!(
        digest_file_hex(&path, &Digest::Sha512, 4).unwrap(),
        hex::encode(in_flight)
    );
}

#[test]
fn test_detach_and_reuse() {
    let mut chain = Chain::new(Base64Filter::new());
    let digest_node = chain.link(DigestFilter::new(Digest::Md5));
    let sink = chain.link(MemoryIo::new());

    let mut tail = chain.detach(digest_node).unwrap();
    assert!(matches!(chain.get(sink), Err(Error::Chain(_))));
    assert_eq!(tail.head(), digest_node.id());

    tail.puts("raw").unwrap();
    assert_eq!(tail.get(sink).unwrap().memory(), b"raw");
    assert_eq!(chain.close(), 1);
    assert_eq!(tail.close(), 2);
}

#[test]
fn test_signatures_across_key_types() {
    init_logging();
    let data = b"signed payload";
    let pairs = [
        (Key::from_pem(RSA_PKCS8).unwrap(), Key::from_pem(RSA_PUBLIC).unwrap()),
        (Key::from_pem(EC_PKCS8).unwrap(), Key::from_pem(EC_PUBLIC).unwrap()),
        (Key::hmac("shared").unwrap(), Key::hmac("shared").unwrap()),
    ];
    for (private, public) in &pairs {
        let signature = sign(data, &Digest::Sha256, private).unwrap();
        assert!(verify(data, &Digest::Sha256, &signature, public));
        assert!(!verify(b"other payload", &Digest::Sha256, &signature, public));
        assert!(data.verify(&Digest::Sha256, &signature, public));
    }
}

#[test]
fn test_public_key_cannot_sign() {
    let public = Key::from_pem(EC_PUBLIC).unwrap();
    assert!(matches!(
        sign(b"x", &Digest::Sha256, &public),
        Err(Error::Key(_))
    ));
}

#[test]
fn test_error_channel_records_failures() {
    pipecrypt::clear_errors();
    let mut chain = Chain::new(MemoryIo::wrap(b"read only".to_vec()));
    let err = match chain.write(b"x") {
        Err(Error::Io(err)) => err,
        other => panic!("unexpected result: {other:?}"),
    };
    let recorded = pipecrypt::take_last_error().unwrap();
    assert_eq!(recorded, err);
    assert!(pipecrypt::last_error().is_none());
}
