use gitsafe_crypto::{clean, decrypt, encrypt, KeyMaterial};

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_encrypt(bencher: divan::Bencher, size: usize) {
    let keys = KeyMaterial::generate();
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| encrypt(divan::black_box(&data), divan::black_box(&keys)).unwrap());
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_decrypt(bencher: divan::Bencher, size: usize) {
    let keys = KeyMaterial::generate();
    let data = make_data(size);
    let envelope = encrypt(&data, &keys).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| decrypt(divan::black_box(&envelope), divan::black_box(&keys)).unwrap());
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_clean_already_encrypted(bencher: divan::Bencher, size: usize) {
    // The idempotence probe: decode + MAC check, no keystream.
    let keys = KeyMaterial::generate();
    let envelope = encrypt(&make_data(size), &keys).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| clean(divan::black_box(&envelope), divan::black_box(&keys)).unwrap());
}

fn main() {
    divan::main();
}
