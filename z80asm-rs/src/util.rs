// Copyright (c) 2017, 2018, 2023 Marek Benc <benc.marek.elektro98@proton.me>
//
// Permission to use, copy, modify, and distribute this software for any
// purpose with or without fee is hereby granted, provided that the above
// copyright notice and this permission notice appear in all copies.
//
// THE SOFTWARE IS PROVIDED "AS IS" AND THE AUTHOR DISCLAIMS ALL WARRANTIES
// WITH REGARD TO THIS SOFTWARE INCLUDING ALL IMPLIED WARRANTIES OF
// MERCHANTABILITY AND FITNESS. IN NO EVENT SHALL THE AUTHOR BE LIABLE FOR
// ANY SPECIAL, DIRECT, INDIRECT, OR CONSEQUENTIAL DAMAGES OR ANY DAMAGES
// WHATSOEVER RESULTING FROM LOSS OF USE, DATA OR PROFITS, WHETHER IN AN
// ACTION OF CONTRACT, NEGLIGENCE OR OTHER TORTIOUS ACTION, ARISING OUT OF
// OR IN CONNECTION WITH THE USE OR PERFORMANCE OF THIS SOFTWARE.
//

use log::{Record, Level, LevelFilter, Metadata};

// A plain logger for the command-line front end: informational messages
// go to stdout, warnings and errors to stderr with their level prefixed.
pub struct StderrLogger {
    verbose: bool,
}

static QUIET_LOGGER:   StderrLogger = StderrLogger { verbose: false };
static VERBOSE_LOGGER: StderrLogger = StderrLogger { verbose: true };

impl StderrLogger {
    pub fn install(verbose: bool) -> Result<(), log::SetLoggerError> {
        if verbose {
            log::set_logger(&VERBOSE_LOGGER)?;
            log::set_max_level(LevelFilter::Info);
        } else {
            log::set_logger(&QUIET_LOGGER)?;
            log::set_max_level(LevelFilter::Warn);
        }
        Ok(())
    }
}

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        if self.verbose {
            metadata.level() <= Level::Info
        } else {
            metadata.level() <= Level::Warn
        }
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            if record.level() < Level::Info {
                eprintln!("{}: {}", record.level(), record.args());
            } else {
                println!("{}", record.args());
            }
        }
    }

    fn flush(&self) {}
}
