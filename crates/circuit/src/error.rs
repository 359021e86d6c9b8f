use thiserror::Error;

#[derive(Debug, Error)]
pub enum CircuitError {
	#[error("malformed circuit: {message}")]
	MalformedCircuit { message: String },

	#[error("circuit evaluation: {message}")]
	Eval { message: String },

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

impl CircuitError {
	pub fn malformed(message: impl Into<String>) -> Self {
		CircuitError::MalformedCircuit {
			message: message.into(),
		}
	}

	pub fn eval(message: impl Into<String>) -> Self {
		CircuitError::Eval {
			message: message.into(),
		}
	}
}
