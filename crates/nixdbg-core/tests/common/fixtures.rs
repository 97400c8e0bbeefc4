//! Fake Nix release tarballs.

use sha2::{Digest, Sha256};
use std::io::Write;
use xz2::write::XzEncoder;

pub const NIX_STORE_NAME: &str = "h4d0d6d4hm5w6c1g2sq8mm4n0s2bmpjz-nix-2.99.0";
pub const CACERT_STORE_NAME: &str = "0a1b2c3d4e5f6g7h8i9j0k1l2m3n4o5p-nss-cacert-3.101";

fn append_file(builder: &mut tar::Builder<XzEncoder<Vec<u8>>>, path: &str, data: &[u8], mode: u32) {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(data.len() as u64);
    header.set_mode(mode);
    builder.append_data(&mut header, path, data).unwrap();
}

fn append_dir(builder: &mut tar::Builder<XzEncoder<Vec<u8>>>, path: &str) {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Directory);
    header.set_size(0);
    header.set_mode(0o755);
    builder.append_data(&mut header, path, std::io::empty()).unwrap();
}

/// A `.tar.xz` laid out like an official release: `<stem>/install` plus
/// `<stem>/store/...`.
pub fn release_tarball(stem: &str) -> Vec<u8> {
    let mut builder = tar::Builder::new(XzEncoder::new(Vec::new(), 6));
    append_dir(&mut builder, &format!("{stem}/"));
    let install = format!(
        "#!/bin/sh\nset -eu\nnix=\"/nix/store/{NIX_STORE_NAME}\"\ncacert=\"/nix/store/{CACERT_STORE_NAME}\"\n"
    );
    append_file(&mut builder, &format!("{stem}/install"), install.as_bytes(), 0o755);
    append_dir(&mut builder, &format!("{stem}/store/"));
    append_dir(&mut builder, &format!("{stem}/store/{NIX_STORE_NAME}/"));
    append_dir(&mut builder, &format!("{stem}/store/{NIX_STORE_NAME}/bin/"));
    append_file(
        &mut builder,
        &format!("{stem}/store/{NIX_STORE_NAME}/bin/nix"),
        b"#!/bin/sh\necho nix\n",
        0o755,
    );
    append_dir(&mut builder, &format!("{stem}/store/{CACERT_STORE_NAME}/"));
    append_file(
        &mut builder,
        &format!("{stem}/store/{CACERT_STORE_NAME}/ca-bundle.crt"),
        b"-----BEGIN CERTIFICATE-----\n",
        0o644,
    );
    let mut enc = builder.into_inner().unwrap();
    enc.flush().unwrap();
    enc.finish().unwrap()
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
