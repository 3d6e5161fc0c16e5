//! Helpers for scraping values out of device output.
//!
//! Patterns are matched against each line of the output with surrounding
//! whitespace trimmed; the first capture group is the value.

use regex::{Captures, Regex};

/// First value captured from any line.
pub fn parse_field(output: &str, pattern: &Regex) -> Option<String> {
    parse_field_with(output, pattern, |caps| caps.get(1).map(|m| m.as_str().to_string()))
}

/// First line for which `extract` yields a value.
pub fn parse_field_with<T>(
    output: &str,
    pattern: &Regex,
    extract: impl Fn(&Captures<'_>) -> Option<T>,
) -> Option<T> {
    output
        .lines()
        .map(str::trim)
        .filter_map(|line| pattern.captures(line))
        .find_map(|caps| extract(&caps))
}

/// Values captured from every matching line, in output order, without
/// duplicates.
pub fn parse_fields(output: &str, pattern: &Regex) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for line in output.lines().map(str::trim) {
        if let Some(value) = pattern.captures(line).and_then(|caps| caps.get(1)) {
            if !values.iter().any(|v| v == value.as_str()) {
                values.push(value.as_str().to_string());
            }
        }
    }
    values
}

/// Split output into blocks, each starting at a line matching `header`.
/// Lines before the first header are dropped.
pub fn split_blocks<'a>(output: &'a str, header: &Regex) -> Vec<&'a str> {
    let starts: Vec<usize> = std::iter::once(0)
        .chain(output.match_indices('\n').map(|(i, _)| i + 1))
        .filter(|&start| {
            let line = output[start..].lines().next().unwrap_or_default();
            header.is_match(line.trim_end())
        })
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(output.len());
            output[start..end].trim_end()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOW_IP_INT_BRIEF: &str = "Interface              IP-Address      OK? Method Status                Protocol\r
GigabitEthernet0/0     10.0.0.1        YES NVRAM  up                    up\r
GigabitEthernet0/1     unassigned      YES NVRAM  administratively down down\r
Loopback0              1.1.1.1         YES NVRAM  up                    up\r
";

    #[test]
    fn test_parse_fields_in_order() {
        let pattern = Regex::new(r"^(\S+)\s+\S+\s+(?:YES|NO)").unwrap();
        assert_eq!(
            parse_fields(SHOW_IP_INT_BRIEF, &pattern),
            vec!["GigabitEthernet0/0", "GigabitEthernet0/1", "Loopback0"]
        );
    }

    #[test]
    fn test_parse_field_first_match() {
        let pattern = Regex::new(r"^Loopback0\s+(\S+)").unwrap();
        assert_eq!(parse_field(SHOW_IP_INT_BRIEF, &pattern).as_deref(), Some("1.1.1.1"));

        let missing = Regex::new(r"^Tunnel0\s+(\S+)").unwrap();
        assert_eq!(parse_field(SHOW_IP_INT_BRIEF, &missing), None);
    }

    #[test]
    fn test_parse_field_with_conversion() {
        let pattern = Regex::new(r"^\s*mtu (\d+)").unwrap();
        let mtu: Option<u32> = parse_field_with(" mtu 1500\n", &pattern, |caps| caps[1].parse().ok());
        assert_eq!(mtu, Some(1500));
    }

    #[test]
    fn test_split_blocks() {
        let config = "Building configuration...\n\
                      interface Gi0/0\n description uplink\n mtu 9000\n!\n\
                      interface Gi0/1\n shutdown\n!\n";
        let header = Regex::new(r"^interface ").unwrap();
        let blocks = split_blocks(config, &header);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], "interface Gi0/0\n description uplink\n mtu 9000\n!");
        assert_eq!(blocks[1], "interface Gi0/1\n shutdown\n!");
    }
}
