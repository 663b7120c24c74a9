use rand::distributions::Alphanumeric;
use rand::Rng;

pub(crate) fn gen_random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
