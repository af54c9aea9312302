// Short name sequence: a..z, aa..az, a0..a9, ba.. and so on.
// The first character is a letter so every name is a valid Java identifier.

const FIRST: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const REST: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Iterates the name sequence up to a maximum length
#[derive(Debug, Clone)]
pub struct NameGenerator {
    next: u64,
    max_length: usize,
}

impl NameGenerator {
    pub fn new(max_length: usize) -> Self {
        Self { next: 0, max_length }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Iterator for NameGenerator {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let name = name_at(self.next)?;
        if name.len() > self.max_length {
            return None;
        }
        self.next += 1;
        Some(name)
    }
}

/// The `index`-th name of the sequence
pub fn name_at(mut index: u64) -> Option<String> {
    let first = FIRST.len() as u64;
    let rest = REST.len() as u64;

    // Find the length bucket holding `index`
    let mut length = 1;
    let mut bucket = first;
    while index >= bucket {
        index -= bucket;
        length += 1;
        bucket = bucket.checked_mul(rest)?;
    }

    let mut tail = Vec::with_capacity(length - 1);
    for _ in 1..length {
        tail.push(REST[(index % rest) as usize]);
        index /= rest;
    }
    let mut name = String::with_capacity(length);
    name.push(FIRST[index as usize] as char);
    name.extend(tail.iter().rev().map(|b| *b as char));
    Some(name)
}

/// Whether `name` is a member of the sequence no longer than `max_length`
pub fn is_sequence_name(name: &str, max_length: usize) -> bool {
    let bytes = name.as_bytes();
    match bytes.split_first() {
        Some((first, rest)) => {
            bytes.len() <= max_length && FIRST.contains(first) && rest.iter().all(|b| REST.contains(b))
        }
        None => false,
    }
}
