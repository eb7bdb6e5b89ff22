// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Built-in timed operations.

use nix::unistd::getppid as sys_getppid;

use pacebench_core::WorkerSlot;

use crate::harness::RunContext;

/// Write the whole shared buffer to offset 0 of the worker's file.
///
/// A failed write is logged and the iteration still counts.
pub fn positioned_write(ctx: &RunContext<'_>, slot: WorkerSlot) {
    let Some(target) = ctx.write_target() else {
        tracing::error!(slot = %slot, "positioned_write needs a write target");
        return;
    };
    if let Err(errno) = target.write_slot(slot) {
        tracing::error!(slot = %slot, error = %errno, "Write failed");
    }
}

/// Does nothing. Measures the harness itself.
pub fn noop(_ctx: &RunContext<'_>, _slot: WorkerSlot) {}

/// One `getppid()` system call.
pub fn getppid(_ctx: &RunContext<'_>, _slot: WorkerSlot) {
    std::hint::black_box(sys_getppid());
}
