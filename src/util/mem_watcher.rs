//! 读取 `/proc/self/statm` 估计进程常驻内存.
use std::fs;
use std::io::{Error, ErrorKind, Result};

use nom::IResult;
use nom::Parser;
use nom::bytes::complete::tag;
use nom::character::complete::digit1;
use nom::combinator::map_res;
use nom::multi::count;
use nom::sequence::terminated;

/// 单位为页.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Statm {
    pub size: usize,

    pub resident: usize,

    pub share: usize,

    pub text: usize,

    pub data: usize,
}

impl Statm {
    pub fn resident_megabytes(&self) -> usize {
        self.resident.saturating_mul(page_size()) / (1024 * 1024)
    }
}

fn page_size() -> usize {
    // SAFETY: sysconf 只读取系统常量.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as usize } else { 4096 }
}

fn map_result<T>(result: IResult<&str, T>) -> Result<T> {
    match result {
        Ok((remaining, val)) if remaining.is_empty() => Ok(val),
        Ok((remaining, _)) => Err(Error::new(
            ErrorKind::InvalidInput,
            format!("unable to parse whole input, remaining: {remaining:?}"),
        )),
        Err(err) => Err(Error::new(
            ErrorKind::InvalidInput,
            format!("unable to parse input: {err:?}"),
        )),
    }
}

fn parse_usize(input: &str) -> IResult<&str, usize> {
    map_res(digit1, |s: &str| s.parse::<usize>()).parse(input)
}

fn parse_statm(input: &str) -> IResult<&str, Statm> {
    (count(terminated(parse_usize, tag(" ")), 6), parse_usize)
        .parse(input)
        .map(|(next_input, res)| {
            let statm = Statm {
                size: res.0[0],
                resident: res.0[1],
                share: res.0[2],
                text: res.0[3],
                data: res.0[5],
            };
            (next_input, statm)
        })
}

pub fn statm_self() -> Result<Statm> {
    let buf = fs::read_to_string("/proc/self/statm")?;
    map_result(parse_statm(buf.trim()))
}

/// 当前常驻内存 (MB); 无法读取 statm 的平台返回 `None`.
pub fn resident_megabytes() -> Option<usize> {
    match statm_self() {
        Ok(statm) => Some(statm.resident_megabytes()),
        Err(err) => {
            log::debug!("statm unavailable: {err}");
            None
        }
    }
}
