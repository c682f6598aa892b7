/*!
# Scopewatch DevKit - Support de tests pour le client de notifications

- Serveur de notifications mock enregistrant chaque requête
- Réponses scriptées par endpoint (status + body, délai optionnel)
- Helpers de logging et d'attente pour les assertions asynchrones
*/

pub mod mock_server;
pub mod test_utils;

pub use mock_server::{unreachable_url, MockNotifyServer, MockResponse, RecordedRequest};
pub use test_utils::{init_test_logging, wait_for_requests, wait_until};
