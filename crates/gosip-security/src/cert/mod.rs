pub mod acme;
pub mod manager;
pub mod types;

pub use acme::{AcmeClient, FakeAcmeClient, IssuedCert};
pub use manager::CertificateManager;
pub use types::{AcmeDirectory, AutomaticConfig, CertMode, CertStatus, ClientAuthPolicy, ManualConfig, TlsMinVersion};
