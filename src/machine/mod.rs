//! The Brookshear machine: 16 8-bit registers, 256 bytes of memory, a
//! byte program counter, and a paced fetch-decode-execute loop.
//!
//! Every mutation goes through a setter that suppresses no-op writes and
//! notifies the observer at most once per real change. Running is
//! cooperative: the run loop sleeps in ~60 Hz ticks between instructions,
//! and `pause`/`step_over`/`set_step_time` requests from a
//! [`MachineHandle`] are observed at those tick boundaries. A step
//! cancelled mid-wait commits nothing.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

mod instruction;

pub use instruction::Instruction;

pub const REGISTER_COUNT: usize = 16;
pub const MEMORY_SIZE: usize = 256;

const DEFAULT_STEP_TIME_MS: u64 = 2000;
/// Pacing tick, roughly 60 progress updates per second.
const FRAME: Duration = Duration::from_micros(16_667);
const FRAME_MILLIS: f32 = 16.667;

/// Push-based notifications for every observable machine mutation.
///
/// Implementations run on the machine's control path and should hand the
/// event off rather than block. All methods default to no-ops so a view
/// layer only implements what it renders.
pub trait MachineObserver: Send + Sync {
    fn on_program_counter_change(&self, _pc: u8) {}
    fn on_register_change(&self, _register: u8, _value: u8) {}
    fn on_memory_change(&self, _address: u8, _value: u8) {}
    fn on_progress_change(&self, _percent: f32) {}
    fn on_info(&self, _message: &str) {}
    fn on_error(&self, _message: &str) {}
    fn on_stop(&self) {}
}

/// Observer that drops every notification.
#[derive(Debug, Default)]
pub struct NullObserver;

impl MachineObserver for NullObserver {}

/// Observer that forwards notifications to the `log` facade.
#[derive(Debug, Default)]
pub struct LogObserver;

impl MachineObserver for LogObserver {
    fn on_program_counter_change(&self, pc: u8) {
        log::trace!("PC = {pc:02X}");
    }

    fn on_register_change(&self, register: u8, value: u8) {
        log::trace!("R{register:X} = {value:02X}");
    }

    fn on_memory_change(&self, address: u8, value: u8) {
        log::trace!("mem[{address:02X}] = {value:02X}");
    }

    fn on_info(&self, message: &str) {
        log::info!("{message}");
    }

    fn on_error(&self, message: &str) {
        log::error!("{message}");
    }

    fn on_stop(&self) {
        log::debug!("machine stopped");
    }
}

pub struct Machine {
    program_counter: u8,
    registers: [u8; REGISTER_COUNT],
    memory: [u8; MEMORY_SIZE],
    progress: f32,
    running: Arc<AtomicBool>,
    step_time_ms: Arc<AtomicU64>,
    skip_pacing: Arc<AtomicBool>,
    observer: Arc<dyn MachineObserver>,
}

/// Control surface usable while [`Machine::run`] holds the machine.
///
/// Clones share the same flags; requests take effect at the next pacing
/// tick, never mid-instruction.
#[derive(Clone)]
pub struct MachineHandle {
    running: Arc<AtomicBool>,
    step_time_ms: Arc<AtomicU64>,
    skip_pacing: Arc<AtomicBool>,
    observer: Arc<dyn MachineObserver>,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    pub fn new() -> Machine {
        Machine::with_observer(Arc::new(NullObserver))
    }

    pub fn with_observer(observer: Arc<dyn MachineObserver>) -> Machine {
        Machine {
            program_counter: 0,
            registers: [0; REGISTER_COUNT],
            memory: [0; MEMORY_SIZE],
            progress: 0.0,
            running: Arc::new(AtomicBool::new(false)),
            step_time_ms: Arc::new(AtomicU64::new(DEFAULT_STEP_TIME_MS)),
            skip_pacing: Arc::new(AtomicBool::new(false)),
            observer,
        }
    }

    pub fn handle(&self) -> MachineHandle {
        MachineHandle {
            running: Arc::clone(&self.running),
            step_time_ms: Arc::clone(&self.step_time_ms),
            skip_pacing: Arc::clone(&self.skip_pacing),
            observer: Arc::clone(&self.observer),
        }
    }

    pub fn program_counter(&self) -> u8 {
        self.program_counter
    }

    /// Register indices use only the low nibble; the high nibble of the
    /// index is ignored.
    pub fn register(&self, register: u8) -> u8 {
        self.registers[usize::from(register & 0x0F)]
    }

    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.registers
    }

    pub fn memory(&self) -> &[u8; MEMORY_SIZE] {
        &self.memory
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Zeroes the program counter and all registers, one notification per
    /// cell that actually changes. Idempotent.
    pub fn reset_cpu(&mut self) {
        self.set_program_counter(0);
        for register in 0..REGISTER_COUNT as u8 {
            self.set_register(register, 0);
        }
    }

    /// Zeroes memory with the same no-op suppression. Idempotent.
    pub fn reset_memory(&mut self) {
        for address in 0..MEMORY_SIZE {
            self.set_memory_cell(address as u8, 0);
        }
    }

    /// Copies the image into memory starting at `offset`, clipped to the
    /// end of memory. Goes through the cell setter so change events fire.
    pub fn load_program(&mut self, program: &[u8], offset: u8) {
        let count = program.len().min(MEMORY_SIZE - usize::from(offset));
        for (i, &byte) in program.iter().take(count).enumerate() {
            self.set_memory_cell(offset + i as u8, byte);
        }
    }

    /// Pacing duration of one instruction while running.
    pub fn set_step_time(&self, ms: u64) {
        self.step_time_ms.store(ms, Ordering::SeqCst);
    }

    /// Moves the program counter. Progress restarts for the new step even
    /// when the counter value itself does not change.
    pub fn set_program_counter(&mut self, pc: u8) {
        self.set_progress(0.0);

        if pc == self.program_counter {
            return;
        }
        self.program_counter = pc;
        self.observer.on_program_counter_change(pc);
    }

    /// Writes a register, low nibble of the index only. Notifies with the
    /// masked index.
    pub fn set_register(&mut self, register: u8, value: u8) {
        let register = register & 0x0F;
        if self.registers[usize::from(register)] == value {
            return;
        }
        self.registers[usize::from(register)] = value;
        self.observer.on_register_change(register, value);
    }

    pub fn set_memory_cell(&mut self, address: u8, value: u8) {
        if self.memory[usize::from(address)] == value {
            return;
        }
        self.memory[usize::from(address)] = value;
        self.observer.on_memory_change(address, value);
    }

    fn set_progress(&mut self, percent: f32) {
        let clamped = percent.min(100.0);
        if clamped == self.progress {
            return;
        }
        self.progress = clamped;
        self.observer.on_progress_change(clamped);
    }

    /// Runs paced steps until halted, errored, or paused. Idempotent: a
    /// second call while running returns immediately.
    pub async fn run(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        while self.running.load(Ordering::SeqCst) {
            self.run_step(true).await;
        }
    }

    /// Stops execution and notifies. The run loop observes the cleared
    /// flag at its next poll and exits without committing an in-flight
    /// step.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.observer.on_stop();
    }

    /// When idle, executes exactly one instruction with no pacing. When
    /// running, requests the current step's pacing to fast-forward and
    /// commit instead of executing an extra instruction.
    pub async fn step_over(&mut self) {
        if self.running.load(Ordering::SeqCst) {
            self.skip_pacing.store(true, Ordering::SeqCst);
        } else {
            self.run_step(false).await;
        }
    }

    async fn run_step(&mut self, pace: bool) {
        let pc = self.program_counter;
        let high = self.memory[usize::from(pc)];
        let low = self.memory[usize::from(pc.wrapping_add(1))];

        let instruction = match Instruction::decode(high, low) {
            Some(instruction) => instruction,
            None => {
                self.observer.on_error("Opcode not found. Halted.");
                self.stop();
                return;
            }
        };

        if instruction == Instruction::Halt {
            self.observer.on_info("Halt execution.");
            self.stop();
            return;
        }

        self.observer.on_info(&instruction.describe());

        if pace && !self.wait_progress().await {
            // Cancelled mid-wait: the step commits nothing.
            return;
        }

        self.execute(instruction);
        self.set_program_counter(self.program_counter.wrapping_add(2));
    }

    /// Spreads one step over the configured duration in ~60 Hz ticks.
    /// Returns false if the run was cancelled before progress hit 100.
    async fn wait_progress(&mut self) -> bool {
        while self.running.load(Ordering::SeqCst) {
            tokio::time::sleep(FRAME).await;

            if self.skip_pacing.swap(false, Ordering::SeqCst) {
                self.set_progress(100.0);
            } else {
                let step_time = self.step_time_ms.load(Ordering::SeqCst).max(1) as f32;
                self.set_progress(self.progress + FRAME_MILLIS / step_time * 100.0);
            }

            if self.progress >= 100.0 {
                return true;
            }
        }

        false
    }

    fn execute(&mut self, instruction: Instruction) {
        match instruction {
            Instruction::Load { register, address } => {
                let value = self.memory[usize::from(address)];
                self.set_register(register, value);
            }
            Instruction::LoadImmediate { register, value } => {
                self.set_register(register, value);
            }
            Instruction::Store { register, address } => {
                let value = self.registers[usize::from(register)];
                self.set_memory_cell(address, value);
            }
            Instruction::Move { from, to } => {
                let value = self.registers[usize::from(from)];
                self.set_register(to, value);
            }
            Instruction::Add { dest, lhs, rhs } | Instruction::AddFloat { dest, lhs, rhs } => {
                // fadd is the same raw byte add; the float reading of
                // register contents lives in `convert`.
                let value = self.registers[usize::from(lhs)]
                    .wrapping_add(self.registers[usize::from(rhs)]);
                self.set_register(dest, value);
            }
            Instruction::Or { dest, lhs, rhs } => {
                let value = self.registers[usize::from(lhs)] | self.registers[usize::from(rhs)];
                self.set_register(dest, value);
            }
            Instruction::And { dest, lhs, rhs } => {
                let value = self.registers[usize::from(lhs)] & self.registers[usize::from(rhs)];
                self.set_register(dest, value);
            }
            Instruction::Xor { dest, lhs, rhs } => {
                let value = self.registers[usize::from(lhs)] ^ self.registers[usize::from(rhs)];
                self.set_register(dest, value);
            }
            Instruction::Rotate { register, steps } => {
                let steps = u32::from(self.registers[usize::from(steps)]);
                let value = self.registers[usize::from(register)].rotate_right(steps);
                self.set_register(register, value);
            }
            Instruction::JumpEq { register, address } => {
                // The unconditional +2 advance lands exactly on BC.
                if self.registers[usize::from(register)] == self.registers[0] {
                    self.program_counter = address.wrapping_sub(2);
                }
            }
            Instruction::Halt => unreachable!("halt is handled before pacing"),
        }
    }
}

impl MachineHandle {
    /// Requests a stop; the in-flight step is discarded at the next
    /// pacing tick.
    pub fn pause(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.observer.on_stop();
    }

    /// Fast-forwards the current step's pacing so it commits immediately.
    /// Meaningless while idle, where it does nothing.
    pub fn step_over(&self) {
        if self.running.load(Ordering::SeqCst) {
            self.skip_pacing.store(true, Ordering::SeqCst);
        }
    }

    pub fn set_step_time(&self, ms: u64) {
        self.step_time_ms.store(ms, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MachineEvent, RecordingObserver};
    use std::time::Duration;

    fn recorded_machine() -> (Machine, Arc<RecordingObserver>) {
        let observer = Arc::new(RecordingObserver::new());
        (Machine::with_observer(observer.clone()), observer)
    }

    #[tokio::test]
    async fn step_over_when_idle_executes_one_instruction() {
        let mut machine = Machine::new();
        machine.load_program(&[0x21, 0x07, 0xC0, 0x00], 0);

        machine.step_over().await;
        assert_eq!(machine.register(1), 0x07);
        assert_eq!(machine.program_counter(), 2);
        assert!(!machine.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn run_executes_until_halt() {
        let (mut machine, observer) = recorded_machine();
        // r1 = 5; r2 = 6; r3 = r1 + r2; halt.
        machine.load_program(&[0x21, 0x05, 0x22, 0x06, 0x53, 0x12, 0xC0, 0x00], 0);
        machine.set_step_time(50);

        machine.run().await;

        assert_eq!(machine.register(3), 11);
        assert_eq!(machine.program_counter(), 6);
        assert!(!machine.is_running());

        let events = observer.events();
        assert!(events.contains(&MachineEvent::Info("Halt execution.".to_owned())));
        assert!(events.contains(&MachineEvent::Stop));
        // No program counter movement after the halt notification.
        let halt_at = events
            .iter()
            .position(|e| e == &MachineEvent::Info("Halt execution.".to_owned()))
            .unwrap();
        assert!(!events[halt_at..]
            .iter()
            .any(|e| matches!(e, MachineEvent::ProgramCounter(_))));
    }

    #[tokio::test]
    async fn invalid_opcode_reports_and_stops() {
        let (mut machine, observer) = recorded_machine();
        // Memory is all zeroes; opcode 0 is unassigned.
        machine.run().await;

        assert!(!machine.is_running());
        assert_eq!(machine.program_counter(), 0);
        let events = observer.events();
        assert!(events.contains(&MachineEvent::Error("Opcode not found. Halted.".to_owned())));
        assert!(events.contains(&MachineEvent::Stop));
    }

    #[tokio::test]
    async fn conditional_jump_loops_in_place() {
        let mut machine = Machine::new();
        // jmp 0x0, 0 -> register 0 always equals itself.
        machine.load_program(&[0xB0, 0x00], 0);

        for _ in 0..3 {
            machine.step_over().await;
            assert_eq!(machine.program_counter(), 0);
        }
    }

    #[tokio::test]
    async fn jump_falls_through_when_registers_differ() {
        let mut machine = Machine::new();
        machine.load_program(&[0x21, 0x01, 0xB1, 0x00, 0xC0, 0x00], 0);

        machine.step_over().await; // r1 = 1
        machine.step_over().await; // jmp not taken, r1 != r0
        assert_eq!(machine.program_counter(), 4);
    }

    #[tokio::test]
    async fn rotate_is_cyclic() {
        let mut machine = Machine::new();
        machine.set_register(1, 0b0000_0001);
        machine.set_register(2, 1);
        // ror r1 by r2 steps.
        machine.load_program(&[0xA1, 0x02], 0);

        machine.step_over().await;
        assert_eq!(machine.register(1), 0b1000_0000);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_discards_the_in_flight_step() {
        let (mut machine, observer) = recorded_machine();
        machine.load_program(&[0x21, 0x07, 0xC0, 0x00], 0);
        let handle = machine.handle();

        let task = tokio::spawn(async move {
            machine.run().await;
            machine
        });

        // Interrupt inside the first step's 2000 ms pacing window.
        tokio::time::sleep(Duration::from_millis(5)).await;
        handle.pause();
        let machine = task.await.unwrap();

        assert_eq!(machine.register(1), 0);
        assert_eq!(machine.program_counter(), 0);
        assert!(observer.events().contains(&MachineEvent::Stop));
    }

    #[tokio::test(start_paused = true)]
    async fn step_over_while_running_fast_forwards_the_step() {
        let mut machine = Machine::new();
        machine.load_program(&[0x21, 0x07, 0xC0, 0x00], 0);
        let handle = machine.handle();

        let task = tokio::spawn(async move {
            machine.run().await;
            machine
        });

        tokio::time::sleep(Duration::from_millis(5)).await;
        handle.step_over();
        // Default pacing is 2000 ms; the fast-forwarded step commits at
        // the next tick and the following step halts the machine.
        let machine = task.await.unwrap();

        assert_eq!(machine.register(1), 0x07);
        assert_eq!(machine.program_counter(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn set_step_time_applies_at_the_next_tick() {
        let mut machine = Machine::new();
        machine.load_program(&[0x21, 0x07, 0xC0, 0x00], 0);
        machine.set_step_time(10_000);
        let handle = machine.handle();

        let task = tokio::spawn(async move {
            machine.run().await;
            machine
        });

        tokio::time::sleep(Duration::from_millis(5)).await;
        handle.set_step_time(1);
        let machine = task.await.unwrap();
        assert_eq!(machine.register(1), 0x07);
    }

    #[test]
    fn reset_cpu_suppresses_noop_notifications() {
        let (mut machine, observer) = recorded_machine();
        machine.set_register(3, 9);
        machine.set_program_counter(4);

        machine.reset_cpu();
        let first = observer.take_events();
        assert!(first.contains(&MachineEvent::Register(3, 0)));
        assert!(first.contains(&MachineEvent::ProgramCounter(0)));

        machine.reset_cpu();
        assert!(observer.take_events().is_empty());
    }

    #[test]
    fn reset_memory_suppresses_noop_notifications() {
        let (mut machine, observer) = recorded_machine();
        machine.set_memory_cell(0x80, 0xFF);

        machine.reset_memory();
        assert_eq!(
            observer.take_events(),
            vec![
                MachineEvent::Memory(0x80, 0xFF),
                MachineEvent::Memory(0x80, 0x00)
            ]
        );

        machine.reset_memory();
        assert!(observer.take_events().is_empty());
    }

    #[test]
    fn repeated_writes_of_the_same_value_notify_once() {
        let (mut machine, observer) = recorded_machine();
        machine.set_register(1, 5);
        machine.set_register(1, 5);
        machine.set_memory_cell(0x10, 7);
        machine.set_memory_cell(0x10, 7);

        assert_eq!(
            observer.take_events(),
            vec![MachineEvent::Register(1, 5), MachineEvent::Memory(0x10, 7)]
        );
    }

    #[test]
    fn register_index_uses_only_the_low_nibble() {
        let (mut machine, observer) = recorded_machine();
        machine.set_register(0x17, 9);

        assert_eq!(machine.register(7), 9);
        assert_eq!(machine.register(0x17), 9);
        assert_eq!(observer.take_events(), vec![MachineEvent::Register(7, 9)]);
    }

    #[test]
    fn load_program_clips_at_the_end_of_memory() {
        let (mut machine, observer) = recorded_machine();
        machine.load_program(&[1, 2, 3, 4], 254);

        assert_eq!(machine.memory()[254], 1);
        assert_eq!(machine.memory()[255], 2);
        assert_eq!(machine.memory()[0], 0);
        assert_eq!(observer.take_events().len(), 2);
    }
}
