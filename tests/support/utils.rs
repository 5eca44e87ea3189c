use ntex_bytes::Bytes;
use rand::{distributions::Alphanumeric, Rng};

/// Random alphanumeric body of `len` bytes
pub fn random_body(len: usize) -> Bytes {
    let body: Vec<u8> = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .collect();
    Bytes::from(body)
}

pub fn init_log() {
    let _ = env_logger::try_init();
}
