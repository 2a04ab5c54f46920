//! Parsing of PBS `qstat` output
//!
//! Nothing here fails: a line that does not parse yields `None` and callers
//! treat that as "unknown, ask again later".

use regex::Regex;
use serde::Serialize;
use std::hash::{Hash, Hasher};
use std::sync::LazyLock;

use crate::planner::parse_wall_time;

const ID_COLUMN: usize = 0;
const OWNER_COLUMN: usize = 1;
const NAME_COLUMN: usize = 3;
const STATUS_COLUMN: usize = 7;
const COLUMN_COUNT: usize = 10;

static EXIT_STATUS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*Exit_status = (-?[0-9]+)").unwrap());
static COMMENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*comment = (.+)").unwrap());
static SELECT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*Resource_List\.select = ([0-9]+):model=(\S+)").unwrap());
static WALLTIME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*resources_used\.walltime = (\S+)").unwrap());
static JOB_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*Job_Name = (\S+)").unwrap());
static OUTPUT_PATH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*Output_Path = (\S+)").unwrap());
static JOB_OWNER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*Job_Owner = ([^@\s]+)@(\S+)").unwrap());
static JOB_HEADER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*Job(?: Id)?: ([0-9]+)").unwrap());

/// One job as listed by `qstat`
#[derive(Debug, Clone, Eq, Serialize)]
pub struct QueueEntry {
    /// Numeric job identifier
    pub id: u64,
    /// Job name
    pub name: String,
    /// Single-letter PBS status
    pub status: String,
    /// Submitting user
    pub owner: String,
    /// Short name of the submitting host, when known
    pub host: Option<String>,
}

impl QueueEntry {
    /// Parse a tabular `qstat` line; headers and malformed lines give `None`
    pub fn parse(line: &str) -> Option<QueueEntry> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < COLUMN_COUNT {
            return None;
        }
        let id = parse_job_id(fields[ID_COLUMN])?;
        Some(QueueEntry {
            id,
            name: fields[NAME_COLUMN].to_string(),
            status: fields[STATUS_COLUMN].to_string(),
            owner: fields[OWNER_COLUMN].to_string(),
            host: None,
        })
    }

    /// Finished or exiting (status `E` or `F`)
    pub fn is_finished(&self) -> bool {
        matches!(self.status.as_str(), "E" | "F")
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Hash for QueueEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Numeric prefix of a dotted job identifier (`"12345.server"` -> 12345)
pub fn parse_job_id(text: &str) -> Option<u64> {
    let prefix = text.split('.').next()?;
    prefix.parse().ok()
}

/// Parse every well-formed entry in a `qstat` listing
pub fn parse_queue_entries<S: AsRef<str>>(lines: &[S]) -> Vec<QueueEntry> {
    lines
        .iter()
        .filter_map(|line| QueueEntry::parse(line.as_ref()))
        .collect()
}

/// Owner and submitting host of a job, from `Job_Owner = user@host.domain`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobServer {
    /// User name
    pub owner: String,
    /// Short host name
    pub host: String,
}

/// Resources a job asked for and has used so far
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceUsage {
    /// Nodes selected
    pub nodes: u32,
    /// Architecture model
    pub model: String,
    /// Wall time consumed, hours
    pub wall_hours: f64,
}

/// Name and log location of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobInformation {
    /// Job name
    pub name: String,
    /// Output log path, without the `server:` prefix
    pub output_path: String,
}

/// Host part before the first `.`
pub fn short_host(host: &str) -> &str {
    host.split('.').next().unwrap_or(host)
}

fn first_capture<'a, S: AsRef<str>>(lines: &'a [S], regex: &Regex) -> Option<regex::Captures<'a>> {
    lines.iter().find_map(|line| regex.captures(line.as_ref()))
}

/// `Exit_status` from a long-form dump
pub fn parse_exit_status<S: AsRef<str>>(lines: &[S]) -> Option<i32> {
    first_capture(lines, &EXIT_STATUS_REGEX).and_then(|c| c[1].parse().ok())
}

/// `comment` from a long-form dump
pub fn parse_exit_comment<S: AsRef<str>>(lines: &[S]) -> Option<String> {
    first_capture(lines, &COMMENT_REGEX).map(|c| c[1].trim_end().to_string())
}

/// Selected nodes and model plus consumed wall time from a long-form dump
pub fn parse_resource_usage<S: AsRef<str>>(lines: &[S]) -> Option<ResourceUsage> {
    let select = first_capture(lines, &SELECT_REGEX)?;
    let nodes = select[1].parse().ok()?;
    let model = select[2].to_string();
    let wall_hours = first_capture(lines, &WALLTIME_REGEX)
        .and_then(|c| parse_wall_time(&c[1]))
        .unwrap_or(0.0);
    Some(ResourceUsage {
        nodes,
        model,
        wall_hours,
    })
}

/// Job name and output path from a long-form dump
pub fn parse_job_information<S: AsRef<str>>(lines: &[S]) -> Option<JobInformation> {
    let name = first_capture(lines, &JOB_NAME_REGEX)?[1].to_string();
    let raw_path = first_capture(lines, &OUTPUT_PATH_REGEX)?[1].to_string();
    let output_path = match raw_path.split_once(':') {
        Some((_, path)) => path.to_string(),
        None => raw_path,
    };
    Some(JobInformation { name, output_path })
}

/// Pair each `Job:` header in a multi-job dump with its `Job_Owner` line
pub fn parse_job_servers<S: AsRef<str>>(lines: &[S]) -> Vec<(u64, JobServer)> {
    let mut servers = Vec::new();
    let mut current: Option<u64> = None;
    for line in lines {
        let line = line.as_ref();
        if let Some(c) = JOB_HEADER_REGEX.captures(line) {
            current = c[1].parse().ok();
        } else if let Some(c) = JOB_OWNER_REGEX.captures(line) {
            if let Some(id) = current.take() {
                servers.push((
                    id,
                    JobServer {
                        owner: c[1].to_string(),
                        host: short_host(&c[2]).to_string(),
                    },
                ));
            }
        }
    }
    servers
}

#[cfg(test)]
mod tests {
    use super::*;

    const QSTAT_HEADER: [&str; 3] = [
        "                                                 Req'd       Elap",
        "JobID          User   Queue  Jobname  TSK Nds wallt S wallt Eff",
        "-------------- ------ ------ -------- --- --- ----- - ----- ---",
    ];

    #[test]
    fn test_parse_example_line() {
        let entry = QueueEntry::parse("12345.host user queueA taskA.0 1 1 01:00 R 00:10 50").unwrap();
        assert_eq!(entry.id, 12345);
        assert_eq!(entry.name, "taskA.0");
        assert_eq!(entry.status, "R");
        assert_eq!(entry.owner, "user");
        assert!(!entry.is_finished());
    }

    #[test]
    fn test_parse_skips_headers_and_garbage() {
        for line in QSTAT_HEADER {
            assert!(QueueEntry::parse(line).is_none(), "{}", line);
        }
        assert!(QueueEntry::parse("").is_none());
        assert!(QueueEntry::parse("abc.host user q name 1 1 01:00 R 00:10 50").is_none());

        let mut lines: Vec<&str> = QSTAT_HEADER.to_vec();
        lines.push("1234567.batch user low    100-200-tps.0    5   5 04:00 R 02:33  254%");
        let entries = parse_queue_entries(&lines);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, 1234567);
    }

    #[test]
    fn test_entry_equality_by_id() {
        let a = QueueEntry::parse("1.a u q n1 1 1 01:00 R 00:10 50").unwrap();
        let b = QueueEntry::parse("1.b v q n2 1 1 01:00 F 00:10 50").unwrap();
        assert_eq!(a, b);
        assert!(b.is_finished());
    }

    #[test]
    fn test_parse_job_id() {
        assert_eq!(parse_job_id("9876543.pbspl1.nas.nasa.gov"), Some(9876543));
        assert_eq!(parse_job_id("42"), Some(42));
        assert_eq!(parse_job_id("Job"), None);
    }

    #[test]
    fn test_parse_long_form() {
        let dump = [
            "Job Id: 1234567.pbspl1.nas.nasa.gov",
            "    Job_Name = 100-200-tps.0",
            "    Job_Owner = user@pfe21.nas.nasa.gov",
            "    resources_used.walltime = 02:30:00",
            "    Resource_List.select = 2:model=bro",
            "    comment = job was terminated",
            "    Exit_status = -9",
            "    Output_Path = pfe21.nas.nasa.gov:/home/user/pbs-100-200-tps.0",
        ];
        assert_eq!(parse_exit_status(&dump), Some(-9));
        assert_eq!(parse_exit_comment(&dump).as_deref(), Some("job was terminated"));
        assert_eq!(
            parse_resource_usage(&dump),
            Some(ResourceUsage {
                nodes: 2,
                model: "bro".to_string(),
                wall_hours: 2.5
            })
        );
        assert_eq!(
            parse_job_information(&dump),
            Some(JobInformation {
                name: "100-200-tps.0".to_string(),
                output_path: "/home/user/pbs-100-200-tps.0".to_string()
            })
        );
    }

    #[test]
    fn test_long_form_missing_lines() {
        let running = ["Job Id: 1.server", "    job_state = R"];
        assert_eq!(parse_exit_status(&running), None);
        assert_eq!(parse_exit_comment(&running), None);
        assert_eq!(parse_resource_usage(&running), None);
        assert_eq!(parse_job_information(&running), None);
    }

    #[test]
    fn test_parse_job_servers() {
        let dump = [
            "Job: 1234587.batch",
            "    Job_Owner = user@host1.example.com",
            "Job: 1234597.batch",
            "    Job_Owner = user@host2.example.com",
            "Job: 1234599.batch",
        ];
        let servers = parse_job_servers(&dump);
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].0, 1234587);
        assert_eq!(servers[0].1.host, "host1");
        assert_eq!(servers[1].1.owner, "user");
        assert_eq!(servers[1].1.host, "host2");
    }

    #[test]
    fn test_short_host() {
        assert_eq!(short_host("pfe21.nas.nasa.gov"), "pfe21");
        assert_eq!(short_host("laptop"), "laptop");
    }
}
