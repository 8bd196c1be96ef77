use kan_core::KanResult;
use kan_domain::slugify;
use kan_persistence::CardStore;

/// Deterministic slugs with collision disambiguation within one board.
pub struct AliasService;

impl AliasService {
    /// Slugify `title` and append `-2`, `-3`, ... until the alias is
    /// unique among the board's cards. `exclude_id` keeps a card's own
    /// on-disk alias from counting as a collision during an edit.
    pub async fn generate(
        cards: &CardStore,
        board: &str,
        title: &str,
        exclude_id: Option<&str>,
    ) -> KanResult<String> {
        let base = slugify(title);
        let taken: Vec<String> = cards
            .list(board)
            .await?
            .into_iter()
            .filter(|c| Some(c.id.as_str()) != exclude_id)
            .map(|c| c.alias)
            .collect();

        if !taken.iter().any(|a| a == &base) {
            return Ok(base);
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}-{n}");
            if !taken.iter().any(|a| a == &candidate) {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    /// Whether `alias` is already used by a card other than `exclude_id`.
    pub async fn is_taken(
        cards: &CardStore,
        board: &str,
        alias: &str,
        exclude_id: Option<&str>,
    ) -> KanResult<bool> {
        Ok(cards
            .list(board)
            .await?
            .iter()
            .any(|c| c.alias == alias && Some(c.id.as_str()) != exclude_id))
    }
}
