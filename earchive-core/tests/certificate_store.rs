use earchive_core::certificate::{
    resolve_certificate, CertificateError, CertificateStore, PemCertificateStore, SerialNumber,
};
use rcgen::{CertificateParams, KeyPair};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// Writes a self-signed certificate with the given serial; the key goes into the same file
/// or into a sibling `.key` file.
fn write_certificate(dir: &Path, stem: &str, serial: &[u8], key_alongside: bool) {
    let key_pair = KeyPair::generate().expect("generate key");
    let mut params =
        CertificateParams::new(vec![format!("{stem}.example")]).expect("certificate params");
    params.serial_number = Some(rcgen::SerialNumber::from_slice(serial));
    let cert = params.self_signed(&key_pair).expect("self-signed certificate");

    let cert_path = dir.join(format!("{stem}.pem"));
    if key_alongside {
        fs::write(
            &cert_path,
            format!("{}{}", cert.pem(), key_pair.serialize_pem()),
        )
        .unwrap();
    } else {
        fs::write(&cert_path, cert.pem()).unwrap();
        fs::write(dir.join(format!("{stem}.key")), key_pair.serialize_pem()).unwrap();
    }
}

#[test]
fn finds_certificate_by_serial_with_embedded_key() {
    let dir = tempdir().unwrap();
    write_certificate(dir.path(), "finesa", &[0x3b, 0x48, 0xf1, 0x7b], true);
    write_certificate(dir.path(), "other", &[0x11, 0x22], true);

    let store = PemCertificateStore::new(dir.path());
    let certificate = resolve_certificate(&store, "3b 48 f1 7b").expect("certificate resolves");

    assert_eq!(certificate.serial, SerialNumber::parse("3B48F17B").unwrap());
    assert_eq!(certificate.source, dir.path().join("finesa.pem"));
    let pem = String::from_utf8(certificate.identity_pem).unwrap();
    assert!(pem.contains("BEGIN CERTIFICATE"));
    assert!(pem.contains("PRIVATE KEY"));
}

#[test]
fn picks_up_sibling_key_file() {
    let dir = tempdir().unwrap();
    write_certificate(dir.path(), "split", &[0x01, 0x02, 0x03], false);

    let store = PemCertificateStore::new(dir.path());
    let certificate = resolve_certificate(&store, "010203").unwrap();
    let pem = String::from_utf8(certificate.identity_pem).unwrap();
    assert!(pem.contains("BEGIN CERTIFICATE"));
    assert!(pem.contains("PRIVATE KEY"));
}

#[test]
fn certificate_without_key_is_an_error() {
    let dir = tempdir().unwrap();
    write_certificate(dir.path(), "nokey", &[0x0a, 0x0b], false);
    fs::remove_file(dir.path().join("nokey.key")).unwrap();

    let store = PemCertificateStore::new(dir.path());
    let err = store
        .find_by_serial(&SerialNumber::parse("0A0B").unwrap())
        .unwrap_err();
    assert!(matches!(err, CertificateError::MissingPrivateKey(_)));
}

#[test]
fn duplicate_serials_are_ambiguous() {
    let dir = tempdir().unwrap();
    write_certificate(dir.path(), "first", &[0x42, 0x42], true);
    write_certificate(dir.path(), "second", &[0x42, 0x42], true);

    let store = PemCertificateStore::new(dir.path());
    assert!(matches!(
        resolve_certificate(&store, "4242"),
        Err(CertificateError::Ambiguous { count: 2, .. })
    ));
    assert!(matches!(
        resolve_certificate(&store, "ABCDEF"),
        Err(CertificateError::NotFound(_))
    ));
}
