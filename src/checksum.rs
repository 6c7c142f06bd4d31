use sha2::{Digest as _, Sha256};

pub const DIGEST_LEN: usize = 32;

pub type Digest = [u8; DIGEST_LEN];

pub fn sha256(data: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn hex(digest: &Digest) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
