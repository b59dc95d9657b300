use crate::error::{GovernanceError, Result};
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sno_economics::{AccountAddress, TokenAmount};
use sno_types::{JobId, UserHash, ValidatorId};
use std::collections::HashSet;

/// Upper bound on a single encoded call.
pub const MAX_CALL_BYTES: u64 = 64 * 1024;

/// Wire codes of the governed actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FunctionType {
    RemoveValidator = 0,
    MatchJob = 1,
    CompleteJob = 2,
    CancelJob = 3,
    RequestJob = 4,
    MintTokens = 5,
    AdvanceEmissionEpoch = 6,
}

impl TryFrom<u8> for FunctionType {
    type Error = u8;

    fn try_from(code: u8) -> std::result::Result<Self, u8> {
        Ok(match code {
            0 => FunctionType::RemoveValidator,
            1 => FunctionType::MatchJob,
            2 => FunctionType::CompleteJob,
            3 => FunctionType::CancelJob,
            4 => FunctionType::RequestJob,
            5 => FunctionType::MintTokens,
            6 => FunctionType::AdvanceEmissionEpoch,
            other => return Err(other),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveValidatorCall {
    pub validator_id: ValidatorId,
}

/// Binds a stored request to the workers that will serve it. The user hash
/// and capacity must repeat the request exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchJobCall {
    pub user_hash: UserHash,
    pub job_id: JobId,
    pub capacity: Vec<u128>,
    pub workers: Vec<AccountAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteJobCall {
    pub job_id: JobId,
    pub workers: Vec<AccountAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelJobCall {
    pub job_id: JobId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestJobCall {
    pub user_hash: UserHash,
    pub job_id: JobId,
    pub capacity: Vec<u128>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintTokensCall {
    pub to: AccountAddress,
    pub amount: TokenAmount,
}

/// A governed action, decoded once when the proposal is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    RemoveValidator(RemoveValidatorCall),
    MatchJob(MatchJobCall),
    CompleteJob(CompleteJobCall),
    CancelJob(CancelJobCall),
    RequestJob(RequestJobCall),
    MintTokens(MintTokensCall),
    AdvanceEmissionEpoch,
}

fn codec() -> impl Options {
    bincode::options()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(MAX_CALL_BYTES)
        .reject_trailing_bytes()
}

fn encode_payload<T: Serialize>(payload: &T) -> Result<Vec<u8>> {
    codec()
        .serialize(payload)
        .map_err(|e| GovernanceError::Encoding(e.to_string()))
}

fn decode_payload<T: DeserializeOwned>(position: usize, function_type: u8, bytes: &[u8]) -> Result<T> {
    codec()
        .deserialize(bytes)
        .map_err(|e| GovernanceError::MalformedCall {
            position,
            function_type,
            reason: e.to_string(),
        })
}

impl Command {
    pub fn function_type(&self) -> FunctionType {
        match self {
            Command::RemoveValidator(_) => FunctionType::RemoveValidator,
            Command::MatchJob(_) => FunctionType::MatchJob,
            Command::CompleteJob(_) => FunctionType::CompleteJob,
            Command::CancelJob(_) => FunctionType::CancelJob,
            Command::RequestJob(_) => FunctionType::RequestJob,
            Command::MintTokens(_) => FunctionType::MintTokens,
            Command::AdvanceEmissionEpoch => FunctionType::AdvanceEmissionEpoch,
        }
    }

    /// `(function_type, encoded_call)` pair as submitted to `createProposal`.
    pub fn encode(&self) -> Result<(u8, Vec<u8>)> {
        let bytes = match self {
            Command::RemoveValidator(call) => encode_payload(call)?,
            Command::MatchJob(call) => encode_payload(call)?,
            Command::CompleteJob(call) => encode_payload(call)?,
            Command::CancelJob(call) => encode_payload(call)?,
            Command::RequestJob(call) => encode_payload(call)?,
            Command::MintTokens(call) => encode_payload(call)?,
            Command::AdvanceEmissionEpoch => encode_payload(&())?,
        };
        Ok((self.function_type() as u8, bytes))
    }

    /// Decodes and statically validates the call at `position`.
    pub fn decode(position: usize, function_type: u8, bytes: &[u8]) -> Result<Self> {
        let kind = FunctionType::try_from(function_type)
            .map_err(|code| GovernanceError::UnknownFunctionType {
                position,
                function_type: code,
            })?;

        let command = match kind {
            FunctionType::RemoveValidator => {
                Command::RemoveValidator(decode_payload(position, function_type, bytes)?)
            }
            FunctionType::MatchJob => Command::MatchJob(decode_payload(position, function_type, bytes)?),
            FunctionType::CompleteJob => {
                Command::CompleteJob(decode_payload(position, function_type, bytes)?)
            }
            FunctionType::CancelJob => Command::CancelJob(decode_payload(position, function_type, bytes)?),
            FunctionType::RequestJob => {
                Command::RequestJob(decode_payload(position, function_type, bytes)?)
            }
            FunctionType::MintTokens => {
                Command::MintTokens(decode_payload(position, function_type, bytes)?)
            }
            FunctionType::AdvanceEmissionEpoch => {
                decode_payload::<()>(position, function_type, bytes)?;
                Command::AdvanceEmissionEpoch
            }
        };

        command.validate().map_err(|reason| GovernanceError::MalformedCall {
            position,
            function_type,
            reason,
        })?;
        Ok(command)
    }

    /// Checks that need no ledger state.
    fn validate(&self) -> std::result::Result<(), String> {
        match self {
            Command::MatchJob(call) => {
                non_empty_capacity(&call.capacity)?;
                distinct_workers(&call.workers)
            }
            Command::CompleteJob(call) => distinct_workers(&call.workers),
            Command::RequestJob(call) => non_empty_capacity(&call.capacity),
            Command::MintTokens(call) if call.to.is_system() => {
                Err(format!("cannot mint to system account {}", call.to))
            }
            _ => Ok(()),
        }
    }
}

fn non_empty_capacity(capacity: &[u128]) -> std::result::Result<(), String> {
    if capacity.is_empty() {
        return Err("capacity vector is empty".to_string());
    }
    Ok(())
}

fn distinct_workers(workers: &[AccountAddress]) -> std::result::Result<(), String> {
    if workers.is_empty() {
        return Err("worker set is empty".to_string());
    }
    let mut seen = HashSet::with_capacity(workers.len());
    if let Some(dup) = workers.iter().find(|w| !seen.insert(**w)) {
        return Err(format!("worker {} listed twice", dup));
    }
    Ok(())
}

/// Decodes a whole proposal payload.
pub fn decode_all(function_types: &[u8], encoded_calls: &[Vec<u8>]) -> Result<Vec<Command>> {
    if function_types.len() != encoded_calls.len() {
        return Err(GovernanceError::ArityMismatch {
            function_types: function_types.len(),
            encoded_calls: encoded_calls.len(),
        });
    }
    if function_types.is_empty() {
        return Err(GovernanceError::EmptyProposal);
    }

    function_types
        .iter()
        .zip(encoded_calls)
        .enumerate()
        .map(|(position, (ft, bytes))| Command::decode(position, *ft, bytes))
        .collect()
}

/// Encodes commands into the parallel vectors `createProposal` expects.
pub fn encode_all(commands: &[Command]) -> Result<(Vec<u8>, Vec<Vec<u8>>)> {
    let mut function_types = Vec::with_capacity(commands.len());
    let mut encoded_calls = Vec::with_capacity(commands.len());
    for command in commands {
        let (ft, bytes) = command.encode()?;
        function_types.push(ft);
        encoded_calls.push(bytes);
    }
    Ok((function_types, encoded_calls))
}
