//! Natively implemented commands of [`super::ShellLibrary`].
//!
//! Every command takes its arguments as JSON values, resolves paths against
//! the library's working directory, and reports failures as a message plus
//! an exit code. The `"<cmd>: "` prefix is added by the caller.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use itertools::Itertools;
use serde_json::{Map, Value};

use super::shell::Inner;
use super::Outcome;
use crate::error::InvocationFailure;
use crate::shell_string::ShellString;

pub(super) type Native = fn(&Inner, &[Value]) -> Result<Outcome, NativeFailure>;

#[derive(Debug, Clone, PartialEq)]
pub(super) struct NativeFailure {
    pub message: String,
    pub code: i32,
}

impl NativeFailure {
    fn new(message: impl Into<String>) -> Self {
        Self::with_code(message, 1)
    }

    fn with_code(message: impl Into<String>, code: i32) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }

    fn no_such_file(path: &str) -> Self {
        Self::new(format!("no such file or directory: {path}"))
    }
}

type NativeResult = Result<Outcome, NativeFailure>;

fn argument_to_string(argument: &Value) -> String {
    match argument {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Splits leading `-xyz` clusters from the operands. `--` ends the flags and
/// a lone `-` is an operand.
fn parse_flags(args: &[Value], allowed: &str) -> Result<(HashSet<char>, Vec<String>), NativeFailure> {
    let mut flags = HashSet::new();
    let mut operands = Vec::new();
    let mut in_flags = true;

    for argument in args {
        // Arrays are flattened into operands, as in `cat(["a", "b"])`
        if let Value::Array(items) = argument {
            operands.extend(items.iter().map(argument_to_string));
            continue;
        }

        let argument = argument_to_string(argument);

        if in_flags && argument == "--" {
            in_flags = false;
            continue;
        }

        if in_flags && argument.len() > 1 && argument.starts_with('-') {
            for flag in argument.chars().skip(1) {
                if !allowed.contains(flag) {
                    return Err(NativeFailure::new(format!("option not recognized: {flag}")));
                }
                flags.insert(flag);
            }
            continue;
        }

        in_flags = false;
        operands.push(argument);
    }

    Ok((flags, operands))
}

pub(super) fn echo(_inner: &Inner, args: &[Value]) -> NativeResult {
    let (flags, operands) = parse_flags(args, "en")?;

    let mut output = operands.join(" ");
    if flags.contains(&'e') {
        output = unescape(&output);
    }
    if !flags.contains(&'n') {
        output.push('\n');
    }

    Ok(ShellString::ok(output).into())
}

/// Interprets `\\`, `\n` and `\t` in one left-to-right pass.
fn unescape(text: &str) -> String {
    let mut unescaped = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => unescaped.push('\n'),
            Some('t') => unescaped.push('\t'),
            Some('\\') => unescaped.push('\\'),
            Some(other) => {
                unescaped.push('\\');
                unescaped.push(other);
            }
            None => unescaped.push('\\'),
        }
    }

    unescaped
}

pub(super) fn pwd(inner: &Inner, _args: &[Value]) -> NativeResult {
    let cwd = inner.cwd();
    Ok(ShellString::ok(format!("{}\n", cwd.display())).into())
}

pub(super) fn cd(inner: &Inner, args: &[Value]) -> NativeResult {
    let (_, operands) = parse_flags(args, "")?;

    let target = match operands.first().map(String::as_str) {
        None => PathBuf::from(shellexpand::tilde("~").to_string()),
        Some("-") => inner
            .with_state(|state| state.previous.clone())
            .ok_or_else(|| NativeFailure::new("could not find previous directory"))?,
        Some(path) => {
            let resolved = inner.resolve_path(path);
            if !resolved.exists() {
                return Err(NativeFailure::no_such_file(path));
            }
            if !resolved.is_dir() {
                return Err(NativeFailure::new(format!("not a directory: {path}")));
            }
            resolved
        }
    };

    let target = fs::canonicalize(&target).unwrap_or(target);
    inner.with_state(|state| {
        let previous = std::mem::replace(&mut state.cwd, target);
        state.previous = Some(previous);
    });

    Ok(ShellString::ok("").into())
}

pub(super) fn cat(inner: &Inner, args: &[Value]) -> NativeResult {
    let (flags, operands) = parse_flags(args, "n")?;

    if operands.is_empty() {
        return Err(NativeFailure::new("no paths given"));
    }

    let mut output = String::new();
    for operand in &operands {
        let path = inner.resolve_path(operand);
        if path.is_dir() {
            return Err(NativeFailure::new(format!("{operand}: Is a directory")));
        }
        let content = fs::read_to_string(&path).map_err(|_| NativeFailure::no_such_file(operand))?;
        output.push_str(&content);
    }

    if flags.contains(&'n') {
        output = number_lines(&output);
    }

    Ok(ShellString::ok(output).into())
}

fn number_lines(text: &str) -> String {
    let trailing_newline = text.ends_with('\n');
    let mut numbered = text
        .lines()
        .enumerate()
        .map(|(index, line)| format!("{:>6}\t{line}", index + 1))
        .join("\n");
    if trailing_newline {
        numbered.push('\n');
    }
    numbered
}

pub(super) fn ls(inner: &Inner, args: &[Value]) -> NativeResult {
    let (flags, mut operands) = parse_flags(args, "aAd")?;
    let show_all = flags.contains(&'A') || flags.contains(&'a');

    if operands.is_empty() {
        operands.push(".".to_string());
    }

    let mut entries = Vec::new();
    for operand in &operands {
        let path = inner.resolve_path(operand);
        if !path.exists() {
            return Err(NativeFailure::with_code(
                format!("no such file or directory: {operand}"),
                2,
            ));
        }

        if path.is_dir() && !flags.contains(&'d') {
            if flags.contains(&'a') {
                entries.push(".".to_string());
                entries.push("..".to_string());
            }
            let listing = fs::read_dir(&path)
                .map_err(|e| NativeFailure::new(format!("{operand}: {e}")))?
                .filter_map(std::result::Result::ok)
                .map(|entry| entry.file_name().to_string_lossy().to_string())
                .filter(|name| show_all || !name.starts_with('.'))
                .sorted();
            entries.extend(listing);
        } else {
            entries.push(operand.clone());
        }
    }

    let mut output = entries.join("\n");
    if !output.is_empty() {
        output.push('\n');
    }

    Ok(ShellString::ok(output).into())
}

pub(super) fn mkdir(inner: &Inner, args: &[Value]) -> NativeResult {
    let (flags, operands) = parse_flags(args, "p")?;

    if operands.is_empty() {
        return Err(NativeFailure::new("no paths given"));
    }

    for operand in &operands {
        let path = inner.resolve_path(operand);
        if flags.contains(&'p') {
            fs::create_dir_all(&path).map_err(|e| NativeFailure::new(format!("{operand}: {e}")))?;
            continue;
        }

        if path.exists() {
            return Err(NativeFailure::new(format!("path already exists: {operand}")));
        }
        if !path.parent().is_some_and(Path::exists) {
            return Err(NativeFailure::no_such_file(operand));
        }
        fs::create_dir(&path).map_err(|e| NativeFailure::new(format!("{operand}: {e}")))?;
    }

    Ok(ShellString::ok("").into())
}

pub(super) fn touch(inner: &Inner, args: &[Value]) -> NativeResult {
    let (_, operands) = parse_flags(args, "")?;

    if operands.is_empty() {
        return Err(NativeFailure::new("no files given"));
    }

    for operand in &operands {
        let path = inner.resolve_path(operand);
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|_| NativeFailure::no_such_file(operand))?;
        file.set_modified(SystemTime::now())
            .map_err(|e| NativeFailure::new(format!("{operand}: {e}")))?;
    }

    Ok(ShellString::ok("").into())
}

pub(super) fn rm(inner: &Inner, args: &[Value]) -> NativeResult {
    let (flags, operands) = parse_flags(args, "frR")?;
    let force = flags.contains(&'f');
    let recursive = flags.contains(&'r') || flags.contains(&'R');

    if operands.is_empty() {
        return Err(NativeFailure::new("no paths given"));
    }

    for operand in &operands {
        let path = inner.resolve_path(operand);
        if fs::symlink_metadata(&path).is_err() {
            if force {
                continue;
            }
            return Err(NativeFailure::no_such_file(operand));
        }

        let removed = if path.is_dir() && !path.is_symlink() {
            if !recursive {
                return Err(NativeFailure::new(format!("path is a directory: {operand}")));
            }
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.map_err(|e| NativeFailure::new(format!("{operand}: {e}")))?;
    }

    Ok(ShellString::ok("").into())
}

pub(super) fn which(_inner: &Inner, args: &[Value]) -> NativeResult {
    let (_, operands) = parse_flags(args, "")?;

    let Some(program) = operands.first() else {
        return Err(NativeFailure::new("must specify command"));
    };

    Ok(find_executable(program).map_or(Outcome::Value(Value::Null), |path| {
        ShellString::ok(path.to_string_lossy()).into()
    }))
}

fn find_executable(program: &str) -> Option<PathBuf> {
    if program.contains('/') {
        let path = PathBuf::from(program);
        return is_executable(&path).then_some(path);
    }

    let search_path = std::env::var_os("PATH")?;
    std::env::split_paths(&search_path)
        .map(|directory| directory.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path).is_ok_and(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

pub(super) fn test(inner: &Inner, args: &[Value]) -> NativeResult {
    let (flags, operands) = parse_flags(args, "defL")?;

    let (Some(flag), Some(operand)) = (flags.iter().next(), operands.first()) else {
        return Err(NativeFailure::new("could not interpret expression"));
    };

    let path = inner.resolve_path(operand);
    let answer = match *flag {
        'd' => path.is_dir(),
        'e' => path.exists(),
        'f' => path.is_file(),
        'L' => path.is_symlink(),
        _ => false,
    };

    Ok(Outcome::Value(Value::Bool(answer)))
}

/// Toggles shell options: `-e`/`+e` for `fatal`, `-v`/`+v` for `verbose`
/// and `-f`/`+f` for `noglob`.
pub(super) fn set(inner: &Inner, args: &[Value]) -> NativeResult {
    let options: Vec<String> = args.iter().map(argument_to_string).collect();
    if options.is_empty() {
        return Err(NativeFailure::new("must provide an argument"));
    }

    let mut changes = Vec::new();
    for option in &options {
        let enable = match option.chars().next() {
            Some('-') => true,
            Some('+') => false,
            _ => return Err(NativeFailure::new(format!("invalid option: {option}"))),
        };
        for flag in option.chars().skip(1) {
            if !"efv".contains(flag) {
                return Err(NativeFailure::new(format!("option not recognized: {flag}")));
            }
            changes.push((flag, enable));
        }
    }

    inner.config.update(|config| {
        for (flag, enable) in changes {
            match flag {
                'e' => config.fatal = enable,
                'f' => config.noglob = enable,
                _ => config.verbose = enable,
            }
        }
    });

    Ok(ShellString::ok("").into())
}

/// The system temporary directory, looked up once per library.
pub(super) fn tempdir(inner: &Inner, _args: &[Value]) -> NativeResult {
    let cached = inner.with_state(|state| state.tempdir.clone());
    let directory = match cached {
        Some(directory) => directory,
        None => {
            let directory = std::env::temp_dir();
            if !directory.is_dir() {
                return Err(NativeFailure::new(format!(
                    "no such file or directory: {}",
                    directory.display()
                )));
            }
            inner.with_state(|state| state.tempdir = Some(directory.clone()));
            directory
        }
    };

    Ok(ShellString::ok(directory.to_string_lossy()).into())
}

/// Environment of this process as a JSON object.
pub(super) fn environment() -> Value {
    let variables: Map<String, Value> = std::env::vars()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();
    Value::Object(variables)
}

const INVALID_SLEEP: &str = "sleep: sleep time must be an number";

/// Duration for `sleep`: seconds, or a number with an `ms|s|m|h|d` suffix.
/// No argument means one second.
pub(super) fn sleep_duration(args: &[Value]) -> Result<Duration, InvocationFailure> {
    let wait = args.first().map_or_else(|| "1".to_string(), argument_to_string);

    let (number, unit_ms) = match wait.find(|c: char| c.is_ascii_alphabetic()) {
        None => (wait.as_str(), 1000.0),
        Some(split) => {
            let unit_ms = match &wait[split..] {
                "ms" => 1.0,
                "s" => 1000.0,
                "m" => 60_000.0,
                "h" => 3_600_000.0,
                "d" => 86_400_000.0,
                _ => return Err(InvocationFailure::new(1, INVALID_SLEEP)),
            };
            (&wait[..split], unit_ms)
        }
    };

    let amount: f64 = number
        .parse()
        .ok()
        .filter(|amount: &f64| amount.is_finite() && *amount >= 0.0)
        .ok_or_else(|| InvocationFailure::new(1, INVALID_SLEEP))?;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let millis = (amount * unit_ms).round() as u64;
    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SharedConfig, ShellConfig};
    use crate::library::{CommandLibrary, ShellLibrary};

    fn shell_in(dir: &Path) -> ShellLibrary {
        let config = SharedConfig::new(ShellConfig {
            silent: true,
            ..ShellConfig::default()
        });
        ShellLibrary::with_cwd(config, dir)
    }

    fn run(library: &ShellLibrary, name: &str, args: &[&str]) -> Outcome {
        let args: Vec<Value> = args.iter().map(|arg| Value::from(*arg)).collect();
        library.member(name).unwrap().invoke(&args).unwrap().unwrap()
    }

    fn stdout_of(outcome: Outcome) -> ShellString {
        match outcome {
            Outcome::Shell(result) => result,
            other => panic!("Expected a shell result, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_flags() {
        let args = vec![Value::from("-rf"), Value::from("a"), Value::from("-b")];
        let (flags, operands) = parse_flags(&args, "rf").unwrap();

        assert!(flags.contains(&'r'));
        assert!(flags.contains(&'f'));
        assert_eq!(operands, vec!["a", "-b"]);
    }

    #[test]
    fn test_parse_flags_rejects_unknown() {
        let args = vec![Value::from("-z")];
        let failure = parse_flags(&args, "rf").unwrap_err();
        assert_eq!(failure.message, "option not recognized: z");
    }

    #[test]
    fn test_parse_flags_double_dash_and_arrays() {
        let args = vec![
            Value::from("--"),
            Value::from("-v"),
            serde_json::json!(["a.txt", "b.txt"]),
        ];
        let (flags, operands) = parse_flags(&args, "v").unwrap();

        assert!(flags.is_empty());
        assert_eq!(operands, vec!["-v", "a.txt", "b.txt"]);
    }

    #[test]
    fn test_echo() {
        let temp_dir = tempfile::tempdir().unwrap();
        let library = shell_in(temp_dir.path());

        assert_eq!(stdout_of(run(&library, "echo", &["hello", "world"])).stdout, "hello world\n");
        assert_eq!(stdout_of(run(&library, "echo", &["-n", "x"])).stdout, "x");
        assert_eq!(stdout_of(run(&library, "echo", &["-e", "a\\tb"])).stdout, "a\tb\n");
    }

    #[test]
    fn test_echo_escapes_in_one_pass() {
        assert_eq!(unescape("a\\nb"), "a\nb");
        assert_eq!(unescape("a\\\\nb"), "a\\nb");
        assert_eq!(unescape("tab\\t\\\\\\n"), "tab\t\\\n");
        assert_eq!(unescape("keep \\q and \\"), "keep \\q and \\");
    }

    #[test]
    fn test_set_toggles_configuration() {
        let temp_dir = tempfile::tempdir().unwrap();
        let library = shell_in(temp_dir.path());

        stdout_of(run(&library, "set", &["-ev"]));
        let config = library.config().snapshot();
        assert!(config.fatal);
        assert!(config.verbose);

        stdout_of(run(&library, "set", &["+e", "-f"]));
        let config = library.config().snapshot();
        assert!(!config.fatal);
        assert!(config.verbose);
        assert!(config.noglob);

        let unknown = stdout_of(run(&library, "set", &["-z"]));
        assert_eq!(unknown.stderr, "set: option not recognized: z");
        assert!(library.error().is_some());
    }

    #[test]
    fn test_tempdir_is_cached() {
        let temp_dir = tempfile::tempdir().unwrap();
        let library = shell_in(temp_dir.path());

        let first = stdout_of(run(&library, "tempdir", &[])).stdout;
        assert!(library.error().is_none());
        assert!(Path::new(&first).is_dir());

        match run(&library, "test", &["-d", first.as_str()]) {
            Outcome::Value(value) => assert_eq!(value, Value::Bool(true)),
            other => panic!("Expected a value, got {other:?}"),
        }

        let second = stdout_of(run(&library, "tempdir", &[])).stdout;
        assert_eq!(first, second);
    }

    #[test]
    fn test_cd_previous_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(temp_dir.path().join("sub")).unwrap();
        let library = shell_in(temp_dir.path());

        let failure = stdout_of(run(&library, "cd", &["-"]));
        assert_eq!(failure.stderr, "cd: could not find previous directory");

        let before = library.cwd();
        stdout_of(run(&library, "cd", &["sub"]));
        assert!(library.cwd().ends_with("sub"));

        stdout_of(run(&library, "cd", &["-"]));
        assert_eq!(library.cwd(), fs::canonicalize(before).unwrap());
    }

    #[test]
    fn test_cd_file_not_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("file1"), "test1").unwrap();
        let library = shell_in(temp_dir.path());

        let result = stdout_of(run(&library, "cd", &["file1"]));
        assert_eq!(result.code, 1);
        assert_eq!(result.stderr, "cd: not a directory: file1");
    }

    #[test]
    fn test_file_commands_workflow() {
        let temp_dir = tempfile::tempdir().unwrap();
        let library = shell_in(temp_dir.path());

        stdout_of(run(&library, "mkdir", &["-p", "a/b"]));
        stdout_of(run(&library, "touch", &["a/b/file.txt", "a/.hidden"]));

        let listing = stdout_of(run(&library, "ls", &["a"]));
        assert_eq!(listing.stdout, "b\n");

        let listing = stdout_of(run(&library, "ls", &["-A", "a"]));
        assert_eq!(listing.stdout, ".hidden\nb\n");

        let exists = stdout_of(run(&library, "mkdir", &["a"]));
        assert_eq!(exists.stderr, "mkdir: path already exists: a");

        let is_dir = stdout_of(run(&library, "rm", &["a"]));
        assert_eq!(is_dir.stderr, "rm: path is a directory: a");

        stdout_of(run(&library, "rm", &["-rf", "a"]));
        assert!(!temp_dir.path().join("a").exists());

        let missing = stdout_of(run(&library, "rm", &["a"]));
        assert_eq!(missing.code, 1);
        stdout_of(run(&library, "rm", &["-f", "a"]));
    }

    #[test]
    fn test_cat_and_numbering() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("file1"), "test1\n").unwrap();
        fs::write(temp_dir.path().join("file2"), "test2\n").unwrap();
        let library = shell_in(temp_dir.path());

        let result = stdout_of(run(&library, "cat", &["file1", "file2"]));
        assert_eq!(result.stdout, "test1\ntest2\n");

        let numbered = stdout_of(run(&library, "cat", &["-n", "file1"]));
        assert_eq!(numbered.stdout, "     1\ttest1\n");

        let missing = stdout_of(run(&library, "cat", &["/asdfasdf"]));
        assert_eq!(missing.stderr, "cat: no such file or directory: /asdfasdf");
    }

    #[test]
    fn test_test_and_which() {
        let temp_dir = tempfile::tempdir().unwrap();
        let library = shell_in(temp_dir.path());

        match run(&library, "test", &["-d", "."]) {
            Outcome::Value(value) => assert_eq!(value, Value::Bool(true)),
            other => panic!("Expected a value, got {other:?}"),
        }

        match run(&library, "which", &["definitely-not-a-real-program"]) {
            Outcome::Value(value) => assert!(value.is_null()),
            other => panic!("Expected null, got {other:?}"),
        }

        let sh = stdout_of(run(&library, "which", &["sh"]));
        assert!(sh.stdout.ends_with("/sh"));
    }

    #[test]
    fn test_sleep_duration() {
        assert_eq!(sleep_duration(&[]).unwrap(), Duration::from_secs(1));
        assert_eq!(
            sleep_duration(&[Value::from(1.5)]).unwrap(),
            Duration::from_millis(1500)
        );
        assert_eq!(
            sleep_duration(&[Value::from("0.2s")]).unwrap(),
            Duration::from_millis(200)
        );
        assert_eq!(
            sleep_duration(&[Value::from("20ms")]).unwrap(),
            Duration::from_millis(20)
        );
        assert_eq!(
            sleep_duration(&[Value::from("2m")]).unwrap(),
            Duration::from_secs(120)
        );
        assert!(sleep_duration(&[Value::from("soon")]).is_err());
        assert!(sleep_duration(&[Value::from("3y")]).is_err());
    }
}
