//! Load-average sampler (`spec.md` §4.1 "Load average").
//!
//! `/proc/loadavg`'s first three fields, unchanged — the kernel already
//! computes the 1/5/15-minute exponential averages.

#[derive(Debug, thiserror::Error)]
pub enum LoadAvgSamplerError {
    #[error("failed to read /proc/loadavg: {0}")]
    Read(#[from] std::io::Error),
    #[error("/proc/loadavg had fewer than 3 fields")]
    Unparseable,
}

pub fn sample() -> Result<[f64; 3], LoadAvgSamplerError> {
    let contents = std::fs::read_to_string("/proc/loadavg")?;
    parse_loadavg(&contents).ok_or(LoadAvgSamplerError::Unparseable)
}

fn parse_loadavg(contents: &str) -> Option<[f64; 3]> {
    let mut fields = contents.split_whitespace();
    let one = fields.next()?.parse().ok()?;
    let five = fields.next()?.parse().ok()?;
    let fifteen = fields.next()?.parse().ok()?;
    Some([one, five, fifteen])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_three_fields() {
        let la = parse_loadavg("0.52 0.58 0.59 2/724 123456").unwrap();
        assert_eq!(la, [0.52, 0.58, 0.59]);
    }
}
