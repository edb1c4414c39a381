/// `git log` format producing one pipe-delimited commit record per line
pub const COMMIT_RECORD_FORMAT: &str = "--format=%H|%h|%s|%an|%ai";

/// Parse a single `%H|%h|%s|%an|%ai` line
///
/// Hash and short hash are the first two fields, author and date the last
/// two; whatever sits between is the subject, so a `|` inside a subject
/// survives. Fewer than five fields means the record is unusable and `None`
/// is returned rather than a partially filled record.
pub fn parse_commit_record(line: &str) -> Option<CommitRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let mut head = line.splitn(3, '|');
    let hash = head.next()?;
    let short_hash = head.next()?;
    let rest = head.next()?;

    let mut tail = rest.rsplitn(3, '|');
    let date = tail.next()?;
    let author = tail.next()?;
    let subject = tail.next()?;

    if hash.is_empty() || short_hash.is_empty() {
        return None;
    }

    Some(CommitRecord {
        hash: hash.to_string(),
        short_hash: short_hash.to_string(),
        subject: subject.to_string(),
        author: author.to_string(),
        date: date.to_string(),
    })
}

/// Parse `git log` output in [`COMMIT_RECORD_FORMAT`]
///
/// Blank lines are skipped and malformed lines dropped.
pub fn parse_commit_log(output: &str) -> Vec<CommitRecord> {
    output.lines().filter_map(parse_commit_record).collect()
}

/// Parse git status --porcelain=v2 output
pub fn parse_status_porcelain_v2(output: &str) -> Vec<StatusEntry> {
    let mut entries = Vec::new();

    for line in output.lines() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split(' ').collect();

        match parts[0] {
            "1" => {
                // 1 <XY> <sub> <mH> <mI> <mW> <hH> <hI> <path>
                if parts.len() >= 9 {
                    entries.push(tracked_entry(parts[1], parts[8..].join(" ")));
                }
            }
            "2" => {
                // 2 <XY> <sub> <mH> <mI> <mW> <hH> <hI> <X><score> <path>\t<origPath>
                if parts.len() >= 10 {
                    let joined = parts[9..].join(" ");
                    let path = joined.split('\t').next().unwrap_or_default().to_string();
                    let mut entry = tracked_entry(parts[1], path);
                    entry.status = FileStatus::Renamed;
                    entries.push(entry);
                }
            }
            "u" => {
                // u <XY> <sub> <m1> <m2> <m3> <mW> <h1> <h2> <h3> <path>
                if parts.len() >= 11 {
                    entries.push(StatusEntry {
                        status: FileStatus::Unmerged,
                        path: parts[10..].join(" "),
                        staged: true,
                        unstaged: true,
                    });
                }
            }
            "?" => {
                if parts.len() >= 2 {
                    entries.push(StatusEntry {
                        status: FileStatus::Untracked,
                        path: parts[1..].join(" "),
                        staged: false,
                        unstaged: false,
                    });
                }
            }
            _ => {}
        }
    }

    entries
}

fn tracked_entry(xy: &str, path: String) -> StatusEntry {
    let status = match xy {
        "M." | ".M" | "MM" => FileStatus::Modified,
        "A." | ".A" | "AM" => FileStatus::Added,
        "D." | ".D" => FileStatus::Deleted,
        _ => FileStatus::Unknown,
    };

    StatusEntry {
        status,
        path,
        staged: !xy.starts_with('.'),
        unstaged: xy.chars().nth(1).is_some_and(|c| c != '.'),
    }
}

/// One commit as reported by `git log`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub hash: String,
    pub short_hash: String,
    pub subject: String,
    pub author: String,
    pub date: String,
}

/// Represents a file status entry from git status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub status: FileStatus,
    pub path: String,
    pub staged: bool,
    pub unstaged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Modified,
    Added,
    Deleted,
    Renamed,
    Unmerged,
    Untracked,
    Unknown,
}
