//! Error and result types reported by reflection procedures.
use thiserror::Error;

/// Failure modes of module reflection, queries and constant evaluation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error("module is not ready: {0}")]
    NotReady(&'static str),
    #[error("parse failed: {0}")]
    ParseFailed(&'static str),
    #[error("{0} exceeds the supported range")]
    RangeExceeded(&'static str),
    #[error("internal error: {0}")]
    InternalError(&'static str),
    #[error("element not found")]
    ElementNotFound,
    #[error("{0} is not a valid SPIR-V module size in bytes")]
    InvalidCodeSize(usize),
    #[error("invalid magic number {0:#010x}")]
    InvalidMagicNumber(u32),
    #[error("unexpected end of module at word {0}")]
    UnexpectedEof(usize),
    #[error("invalid reference to id {0}")]
    InvalidIdReference(u32),
    #[error("invalid instruction at word {0}")]
    InvalidInstruction(usize),
    #[error("unexpected block data at id {0}")]
    UnexpectedBlockData(u32),
    #[error("invalid reference to member {1} of block id {0}")]
    InvalidBlockMemberReference(u32, u32),
    #[error("invalid entry point: {0}")]
    InvalidEntryPoint(&'static str),
    #[error("execution mode refers to unknown entry point id {0}")]
    InvalidExecutionMode(u32),
    #[error("id {0} is assigned more than once")]
    DuplicateId(u32),
    #[error("recursion detected at id {0}")]
    Recursion(u32),
    #[error("invalid type at id {0}: {1}")]
    InvalidType(u32, &'static str),
    #[error("expression at id {0} cannot be resolved by the evaluator")]
    UnresolvedEvaluation(u32),
    #[error("evaluation tree failed to initialize at id {0}")]
    EvalTreeInitFailed(u32),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
