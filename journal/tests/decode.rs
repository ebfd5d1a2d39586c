use std::io::Write;

use tokio::io::BufReader;
use tokio::sync::mpsc;

use journal::{
    Action, ActionInstruction, CancelToken, ClauseError, Command, DecodeError, Entry, EntryError,
    Instruction, Journal, read_from,
};

fn entry(line: &str) -> Entry {
    line.parse().expect("decode failed")
}

fn entry_err(line: &str) -> EntryError {
    line.parse::<Entry>().expect_err("decode should have failed")
}

fn command(instruction: Instruction, args: &[&str]) -> Command {
    Command {
        instruction,
        args: args.iter().map(|s| s.to_string()).collect(),
    }
}

fn action(instruction: ActionInstruction, args: &[&str]) -> Action {
    Action {
        instruction,
        args: args.iter().map(|s| s.to_string()).collect(),
    }
}

#[test]
fn instruction_round_trip() {
    let all = [
        Instruction::Rem,
        Instruction::Mkdir,
        Instruction::Copy,
        Instruction::Chmod,
        Instruction::Chown,
        Instruction::Chgrp,
        Instruction::Rm,
        Instruction::Exec,
    ];
    for instruction in all {
        assert_eq!(instruction.as_str().parse(), Ok(instruction));
    }
}

#[test]
fn action_instruction_round_trip() {
    for instruction in [ActionInstruction::Nop, ActionInstruction::Sysctl] {
        assert_eq!(instruction.as_str().parse(), Ok(instruction));
    }
}

#[test]
fn vocabularies_are_case_sensitive() {
    assert!("MKDIR".parse::<Instruction>().is_ok());
    assert!("mkdir".parse::<Instruction>().is_err());
    assert!("Mkdir".parse::<Instruction>().is_err());
    assert!("nop".parse::<ActionInstruction>().is_err());
}

#[test]
fn vocabularies_do_not_overlap() {
    assert!("NOP".parse::<Instruction>().is_err());
    assert!("MKDIR".parse::<ActionInstruction>().is_err());
}

#[test]
fn rem_line_is_never_clause_split() {
    let got = entry("REM hello, there!");
    assert_eq!(got.command, command(Instruction::Rem, &["hello,", "there!"]));
    assert_eq!(got.action, None);
    assert_eq!(got.revert, None);

    // Even a separator in a remark is free text.
    let got = entry("REM do not && split this");
    assert_eq!(
        got.command,
        command(Instruction::Rem, &["do", "not", "&&", "split", "this"])
    );
    assert_eq!(got.action, None);
}

#[test]
fn command_with_action() {
    let got = entry("EXEC apt install -y coredns && NOP");
    assert_eq!(
        got.command,
        command(Instruction::Exec, &["apt", "install", "-y", "coredns"])
    );
    assert_eq!(got.action, Some(action(ActionInstruction::Nop, &[])));
    assert_eq!(got.revert, None);
}

#[test]
fn command_with_action_and_revert() {
    let got = entry("MKDIR /tmp/x && NOP && RM /tmp/x");
    assert_eq!(got.command, command(Instruction::Mkdir, &["/tmp/x"]));
    assert_eq!(got.action, Some(action(ActionInstruction::Nop, &[])));
    assert_eq!(got.revert, Some(command(Instruction::Rm, &["/tmp/x"])));
}

#[test]
fn action_arguments_are_kept() {
    let got = entry("CHMOD 0755 /etc/x && SYSCTL net.ipv4.ip_forward=1");
    assert_eq!(
        got.action,
        Some(action(ActionInstruction::Sysctl, &["net.ipv4.ip_forward=1"]))
    );
}

#[test]
fn blank_lines_are_an_error() {
    assert_eq!(entry_err(""), EntryError::EmptyLine);
    assert_eq!(entry_err("   \t  "), EntryError::EmptyLine);
}

#[test]
fn non_rem_line_requires_an_action() {
    assert_eq!(entry_err("MKDIR /tmp/x"), EntryError::MissingAction);
}

#[test]
fn unknown_command_instruction() {
    assert_eq!(
        entry_err("FOO && NOP"),
        EntryError::Command(ClauseError::UnknownInstruction("FOO".to_string()))
    );
}

#[test]
fn unknown_action_instruction() {
    assert_eq!(
        entry_err("MKDIR /tmp/x && FROB"),
        EntryError::Action(ClauseError::UnknownActionInstruction("FROB".to_string()))
    );
}

#[test]
fn unknown_revert_instruction() {
    assert_eq!(
        entry_err("MKDIR /tmp/x && NOP && frob /tmp/x"),
        EntryError::Revert(ClauseError::UnknownInstruction("frob".to_string()))
    );
}

#[test]
fn empty_clauses_are_an_error() {
    assert_eq!(
        entry_err("&& NOP"),
        EntryError::Command(ClauseError::Empty)
    );
    assert_eq!(
        entry_err("MKDIR /tmp/x && "),
        EntryError::Action(ClauseError::Empty)
    );
    assert_eq!(
        entry_err("MKDIR /tmp/x && NOP && "),
        EntryError::Revert(ClauseError::Empty)
    );
}

// The prefix test for REM is literal: a line starting with "REMOVE" takes
// the remark path and then fails on its head token.
#[test]
fn rem_prefix_is_literal() {
    assert_eq!(
        entry_err("REMOVE /tmp/x && NOP"),
        EntryError::Command(ClauseError::UnknownInstruction("REMOVE".to_string()))
    );
}

// Clause boundaries come from literal substring search, so a separator
// inside an argument value splits the line structurally.
#[test]
fn separator_inside_argument_splits_the_line() {
    assert_eq!(
        entry_err("EXEC echo a&&b && NOP"),
        EntryError::Action(ClauseError::UnknownActionInstruction("b".to_string()))
    );
}

#[test]
fn overlapping_separators_count_as_one() {
    // "&&&" holds two overlapping matches of "&&"; the line has a single
    // boundary and no revert.
    assert_eq!(
        entry_err("MKDIR /tmp/x &&& NOP"),
        EntryError::Action(ClauseError::UnknownActionInstruction("&".to_string()))
    );
}

#[test]
fn decode_normalizes_whitespace() {
    let got = entry("   MKDIR\t/tmp/x\t &&   NOP  ");
    assert_eq!(got, entry("MKDIR /tmp/x && NOP"));
    assert_eq!(got.to_string(), "MKDIR /tmp/x && NOP");
}

#[test]
fn canonical_rendering_round_trips() {
    let lines = [
        "REM hello, there!",
        "MKDIR /tmp/x && NOP",
        "EXEC apt install -y coredns && SYSCTL net.ipv4.ip_forward=1",
        "COPY /src /dst && NOP && RM /dst",
        "CHOWN root /etc/x && NOP && CHOWN games /etc/x",
    ];
    for line in lines {
        let decoded = entry(line);
        assert_eq!(entry(&decoded.to_string()), decoded, "line: {}", line);
    }
}

#[test]
fn journal_parse_collects_entries() {
    let source = "REM setup\nMKDIR /tmp/x && NOP && RM /tmp/x\n";
    let journal = Journal::parse(source).expect("decode failed");
    assert_eq!(journal.entries.len(), 2);
    assert_eq!(
        journal.entries[1].command,
        command(Instruction::Mkdir, &["/tmp/x"])
    );
}

#[test]
fn journal_parse_of_empty_source_is_empty() {
    let journal = Journal::parse("").expect("decode failed");
    assert!(journal.entries.is_empty());
}

#[test]
fn journal_parse_reports_line_numbers() {
    let err = Journal::parse("REM ok\nMKDIR /tmp/x\n").expect_err("should fail");
    match err {
        DecodeError::Entry { line, source } => {
            assert_eq!(line, 2);
            assert_eq!(source, EntryError::MissingAction);
        }
        other => panic!("wrong error: {:?}", other),
    }
}

#[test]
fn journal_rendering_round_trips() {
    let source = "REM setup\nMKDIR /tmp/x && NOP && RM /tmp/x\nEXEC true && NOP\n";
    let journal = Journal::parse(source).expect("decode failed");
    assert_eq!(Journal::parse(&journal.to_string()).unwrap(), journal);
}

#[test]
fn entries_serialize_with_wire_names() {
    let value = serde_json::to_value(entry("MKDIR /tmp/x && NOP")).unwrap();
    assert_eq!(value["command"]["instruction"], "MKDIR");
    assert_eq!(value["action"]["instruction"], "NOP");
    assert!(value["revert"].is_null());
}

#[tokio::test]
async fn stream_decodes_all_entries() {
    let source = "REM setup\nMKDIR /tmp/x && NOP\nRM /tmp/x && NOP\n";
    let (tx, mut rx) = mpsc::channel(1);
    let decoder = tokio::spawn(read_from(
        BufReader::new(source.as_bytes()),
        tx,
        CancelToken::new(),
    ));

    let mut got = Vec::new();
    while let Some(entry) = rx.recv().await {
        got.push(entry);
    }
    decoder.await.unwrap().expect("decode failed");

    assert_eq!(got.len(), 3);
    assert_eq!(got[0].command.instruction, Instruction::Rem);
    assert_eq!(got[2].command, command(Instruction::Rm, &["/tmp/x"]));
}

#[tokio::test]
async fn stream_stops_at_first_error_and_closes_the_sink() {
    let source = "MKDIR /tmp/x && NOP\nBOGUS LINE\nRM /tmp/x && NOP\n";
    let (tx, mut rx) = mpsc::channel(4);
    let decoder = tokio::spawn(read_from(
        BufReader::new(source.as_bytes()),
        tx,
        CancelToken::new(),
    ));

    let mut got = Vec::new();
    while let Some(entry) = rx.recv().await {
        got.push(entry);
    }
    let err = decoder.await.unwrap().expect_err("should fail");

    assert_eq!(got.len(), 1);
    match err {
        DecodeError::Entry { line, source } => {
            assert_eq!(line, 2);
            assert_eq!(source, EntryError::MissingAction);
        }
        other => panic!("wrong error: {:?}", other),
    }
}

// A token cancelled between parsing and handoff drops the parsed entry:
// with a pre-cancelled token nothing is ever delivered.
#[tokio::test]
async fn cancelled_token_stops_the_stream_before_emission() {
    let source = "MKDIR /tmp/x && NOP\nRM /tmp/x && NOP\n";
    let cancel = CancelToken::new();
    cancel.cancel();

    let (tx, mut rx) = mpsc::channel(4);
    let result = read_from(BufReader::new(source.as_bytes()), tx, cancel).await;

    assert!(matches!(result, Err(DecodeError::Cancelled)));
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn cancellation_interrupts_a_blocked_handoff() {
    let source = "MKDIR /a && NOP\nMKDIR /b && NOP\nMKDIR /c && NOP\n";
    let cancel = CancelToken::new();
    let (tx, mut rx) = mpsc::channel(1);
    let decoder = tokio::spawn(read_from(
        BufReader::new(source.as_bytes()),
        tx,
        cancel.clone(),
    ));

    // Take one entry, then cancel without draining further. The decoder
    // buffers at most one more entry before its next send blocks.
    let first = rx.recv().await.expect("no first entry");
    assert_eq!(first.command, command(Instruction::Mkdir, &["/a"]));
    cancel.cancel();

    let err = decoder.await.unwrap().expect_err("should be cancelled");
    assert!(matches!(err, DecodeError::Cancelled));

    let mut rest = 0;
    while rx.recv().await.is_some() {
        rest += 1;
    }
    assert!(rest < 2, "expected undelivered entries to be dropped");
}

#[tokio::test]
async fn dropped_receiver_counts_as_cancellation() {
    let source = "MKDIR /tmp/x && NOP\n";
    let (tx, rx) = mpsc::channel(1);
    drop(rx);

    let result = read_from(BufReader::new(source.as_bytes()), tx, CancelToken::new()).await;
    assert!(matches!(result, Err(DecodeError::Cancelled)));
}

#[tokio::test]
async fn reader_failures_surface_as_io_errors() {
    // Invalid UTF-8 makes line framing fail.
    let bytes: &[u8] = b"MKDIR /tmp\xff && NOP\n";
    let (tx, _rx) = mpsc::channel(1);

    let result = read_from(BufReader::new(bytes), tx, CancelToken::new()).await;
    assert!(matches!(result, Err(DecodeError::Io(_))));
}

#[tokio::test]
async fn stream_decodes_from_a_file() {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    writeln!(file, "REM written to disk").unwrap();
    writeln!(file, "MKDIR /tmp/x && NOP && RM /tmp/x").unwrap();
    file.flush().unwrap();

    let reader = BufReader::new(
        tokio::fs::File::open(file.path())
            .await
            .expect("open temp file"),
    );
    let (tx, mut rx) = mpsc::channel(4);
    let decoder = tokio::spawn(read_from(reader, tx, CancelToken::new()));

    let mut got = Vec::new();
    while let Some(entry) = rx.recv().await {
        got.push(entry);
    }
    decoder.await.unwrap().expect("decode failed");

    assert_eq!(got.len(), 2);
    assert_eq!(got[1].revert, Some(command(Instruction::Rm, &["/tmp/x"])));
}
