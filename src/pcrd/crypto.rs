//! 哈希工具（小写十六进制输出）

use md5::Md5;
use sha1::{Digest, Sha1};

pub fn make_md5(input: &str) -> String {
    format!("{:x}", Md5::digest(input.as_bytes()))
}

pub fn make_sha1(input: &str) -> String {
    format!("{:x}", Sha1::digest(input.as_bytes()))
}
