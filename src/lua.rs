//! Lua bindings, loaded with `require("review_diff")`.
//!
//! ```lua
//! local review = require("review_diff")
//!
//! review.setup_logging(vim.fn.stdpath("log"), "review_diff.log", "debug")
//!
//! -- originals maps each source path to its content
//! local result = review.process(diff_text, { ["src/main.rs"] = main_rs })
//! for _, file in ipairs(result.files) do
//!   if file.error then print(file.error) else print(file.display.path) end
//! end
//!
//! local changes = review.interdiff(original, diff_rev1, diff_rev2)
//! ```
//!
//! Line ranges handed to Lua are 1-based and inclusive.

use crate::cancel::CancellationToken;
use crate::complexity::{ComplexityScore, classify};
use crate::config::DiffOptions;
use crate::differ::{HighlightRegion, diff_content};
use crate::error::Warning;
use crate::interdiff::{InterdiffChunk, InterdiffResult, interdiff};
use crate::normalize::normalize;
use crate::parser::parse_bytes;
use crate::processor::{FileOutcome, process_diff};
use crate::patch::{FilePatch, RawDiffFile};
use crate::rows::{DisplayFile, Row, Side};
use mlua::prelude::*;
use std::collections::HashMap;
use std::ops::Range;

impl IntoLua for HighlightRegion {
    fn into_lua(self, lua: &Lua) -> LuaResult<LuaValue> {
        let table = lua.create_table()?;
        table.set("start", self.start)?;
        table.set("end", self.end)?;
        Ok(LuaValue::Table(table))
    }
}

impl IntoLua for Side {
    fn into_lua(self, lua: &Lua) -> LuaResult<LuaValue> {
        let table = lua.create_table()?;
        table.set("content", self.content)?;
        table.set("line_number", self.line_number)?;
        table.set("is_filler", self.is_filler)?;

        let highlights: Vec<LuaValue> = self
            .highlights
            .into_iter()
            .map(|h| h.into_lua(lua))
            .collect::<LuaResult<_>>()?;
        table.set("highlights", lua.create_sequence_from(highlights)?)?;

        Ok(LuaValue::Table(table))
    }
}

impl IntoLua for Row {
    fn into_lua(self, lua: &Lua) -> LuaResult<LuaValue> {
        let table = lua.create_table()?;
        table.set("left", self.left.into_lua(lua)?)?;
        table.set("right", self.right.into_lua(lua)?)?;
        table.set("moved", self.moved)?;
        Ok(LuaValue::Table(table))
    }
}

impl IntoLua for DisplayFile {
    fn into_lua(self, lua: &Lua) -> LuaResult<LuaValue> {
        let table = lua.create_table()?;
        table.set("path", self.path)?;
        table.set("status", self.change.as_str())?;
        table.set("additions", self.additions)?;
        table.set("deletions", self.deletions)?;

        let rows: Vec<LuaValue> = self
            .rows
            .into_iter()
            .map(|r| r.into_lua(lua))
            .collect::<LuaResult<_>>()?;
        table.set("rows", lua.create_sequence_from(rows)?)?;

        // Lua sequences are 1-indexed.
        let hunk_starts = self.hunk_starts.into_iter().map(|row| row + 1);
        table.set("hunk_starts", lua.create_sequence_from(hunk_starts)?)?;

        Ok(LuaValue::Table(table))
    }
}

impl IntoLua for ComplexityScore {
    fn into_lua(self, lua: &Lua) -> LuaResult<LuaValue> {
        let ratios = self.ratios();
        let table = lua.create_table()?;
        table.set("inserts", self.inserts)?;
        table.set("deletes", self.deletes)?;
        table.set("replaces", self.replaces)?;
        table.set("total_lines", self.total_lines)?;
        table.set("bucket", self.bucket.as_str())?;
        table.set("change_ratio", self.change_ratio())?;
        table.set("insert_ratio", ratios.inserts)?;
        table.set("delete_ratio", ratios.deletes)?;
        table.set("replace_ratio", ratios.replaces)?;
        Ok(LuaValue::Table(table))
    }
}

impl IntoLua for InterdiffChunk {
    fn into_lua(self, lua: &Lua) -> LuaResult<LuaValue> {
        let table = lua.create_table()?;
        table.set("tag", self.tag.as_str())?;
        table.set("provenance", self.provenance.as_str())?;
        table.set("old", range_into_lua(lua, &self.old)?)?;
        table.set("new", range_into_lua(lua, &self.new)?)?;
        Ok(LuaValue::Table(table))
    }
}

impl IntoLua for InterdiffResult {
    fn into_lua(self, lua: &Lua) -> LuaResult<LuaValue> {
        let table = lua.create_table()?;
        table.set("old_lines", lua.create_sequence_from(self.old_lines)?)?;
        table.set("new_lines", lua.create_sequence_from(self.new_lines)?)?;

        let chunks: Vec<LuaValue> = self
            .chunks
            .into_iter()
            .map(|c| c.into_lua(lua))
            .collect::<LuaResult<_>>()?;
        table.set("chunks", lua.create_sequence_from(chunks)?)?;

        Ok(LuaValue::Table(table))
    }
}

/// `{ first = n, last = m }`; `last < first` for an empty range.
fn range_into_lua(lua: &Lua, range: &Range<usize>) -> LuaResult<LuaTable> {
    let table = lua.create_table()?;
    table.set("first", range.start + 1)?;
    table.set("last", range.end)?;
    Ok(table)
}

fn outcome_into_lua(lua: &Lua, outcome: FileOutcome) -> LuaResult<LuaTable> {
    let table = lua.create_table()?;
    table.set("index", outcome.index + 1)?;

    match outcome.result {
        Ok(file) => {
            table.set("path", file.patch.display_path())?;
            table.set("status", file.patch.change.as_str())?;
            table.set("binary", file.patch.is_binary)?;
            if let Some(display) = file.display() {
                table.set("display", display.into_lua(lua)?)?;
            }
            if let Some(complexity) = file.complexity {
                table.set("complexity", complexity.into_lua(lua)?)?;
            }
            let warnings = file.patch.warnings.iter().map(Warning::to_string);
            table.set("warnings", lua.create_sequence_from(warnings)?)?;
        }
        Err(err) => table.set("error", err.to_string())?,
    }

    Ok(table)
}

fn options_from(toml: Option<String>) -> LuaResult<DiffOptions> {
    match toml {
        Some(source) => DiffOptions::from_toml_str(&source)
            .map_err(|e| LuaError::RuntimeError(format!("invalid diff options: {e}"))),
        None => Ok(DiffOptions::default()),
    }
}

fn single_patch(diff: &LuaString, options: &DiffOptions) -> LuaResult<FilePatch> {
    let parsed = parse_bytes(&diff.as_bytes(), None);
    let mut patches = parsed
        .into_patches()
        .map_err(|e| LuaError::RuntimeError(e.to_string()))?;
    if patches.len() != 1 {
        return Err(LuaError::RuntimeError(format!(
            "expected a diff of exactly one file, found {}",
            patches.len()
        )));
    }
    normalize(&patches.remove(0), &options.normalize)
        .map_err(|e| LuaError::RuntimeError(e.to_string()))
}

/// Processes every file of a diff against the supplied originals.
fn process(
    lua: &Lua,
    (diff, originals, options): (LuaString, HashMap<String, String>, Option<String>),
) -> LuaResult<LuaTable> {
    let options = options_from(options)?;
    let raw = RawDiffFile::new(diff.as_bytes().to_vec());
    let outcomes = process_diff(&raw, &originals, &options, &CancellationToken::new());

    let files: Vec<LuaTable> = outcomes
        .into_iter()
        .map(|o| outcome_into_lua(lua, o))
        .collect::<LuaResult<_>>()?;

    let result = lua.create_table()?;
    result.set("files", lua.create_sequence_from(files)?)?;
    Ok(result)
}

/// Interdiffs two single-file diffs of the same original.
fn interdiff_revisions(
    lua: &Lua,
    (original, old, new, options): (String, LuaString, LuaString, Option<String>),
) -> LuaResult<LuaValue> {
    let options = options_from(options)?;
    let cancel = CancellationToken::new();
    let runtime = |e: crate::error::DiffError| LuaError::RuntimeError(e.to_string());

    let old = diff_content(&original, &single_patch(&old, &options)?, &options, &cancel)
        .map_err(runtime)?;
    let new = diff_content(&original, &single_patch(&new, &options)?, &options, &cancel)
        .map_err(runtime)?;
    interdiff(&old, &new, &options, &cancel)
        .map_err(runtime)?
        .into_lua(lua)
}

fn classify_change(
    lua: &Lua,
    (inserts, deletes, replaces, total): (usize, usize, usize, usize),
) -> LuaResult<LuaValue> {
    classify(
        inserts,
        deletes,
        replaces,
        total,
        &DiffOptions::default().complexity,
    )
    .into_lua(lua)
}

/// Sends tracing events to `dir/file_name`. Returns false if a subscriber
/// was already installed.
fn setup_logging(
    _: &Lua,
    (dir, file_name, level): (String, String, Option<String>),
) -> LuaResult<bool> {
    let level = match level {
        Some(level) => level
            .parse::<tracing::Level>()
            .map_err(|e| LuaError::RuntimeError(format!("invalid log level: {e}")))?,
        None => tracing::Level::INFO,
    };
    let writer = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_max_level(level)
        .try_init()
        .is_ok())
}

/// Creates the Lua module exports. Called by mlua when loaded via `require("review_diff")`.
#[mlua::lua_module]
fn review_diff(lua: &Lua) -> LuaResult<LuaTable> {
    let exports = lua.create_table()?;
    exports.set("process", lua.create_function(process)?)?;
    exports.set("interdiff", lua.create_function(interdiff_revisions)?)?;
    exports.set("classify", lua.create_function(classify_change)?)?;
    exports.set("setup_logging", lua.create_function(setup_logging)?)?;
    Ok(exports)
}
