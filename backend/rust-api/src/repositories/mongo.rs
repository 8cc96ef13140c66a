use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, to_bson, Document};
use mongodb::options::IndexOptions;
use mongodb::{Collection, Database, IndexModel};

use super::{
    sort_participants, sort_questions, sort_sessions_newest_first, AnswerRepository,
    ParticipantRepository, QuestionRepository, RepoResult, SessionRepository,
};
use crate::metrics::track_db_operation;
use crate::models::{Answer, Participant, ParticipantStatus, Question, Session};

const SESSIONS: &str = "sessions";
const PARTICIPANTS: &str = "participants";
const QUESTIONS: &str = "questions";
const ANSWERS: &str = "answers";

fn unique_index(keys: Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

fn plain_index(keys: Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

/// Creates the indexes the repositories depend on. Safe to run on every start.
pub async fn ensure_indexes(db: &Database) -> RepoResult<()> {
    db.collection::<Document>(SESSIONS)
        .create_index(unique_index(doc! { "id": 1 }))
        .await?;

    let participants = db.collection::<Document>(PARTICIPANTS);
    participants
        .create_index(unique_index(doc! { "id": 1 }))
        .await?;
    participants
        .create_index(unique_index(doc! { "userId": 1, "sessionId": 1 }))
        .await?;
    participants
        .create_index(plain_index(doc! { "sessionId": 1, "status": 1 }))
        .await?;

    let questions = db.collection::<Document>(QUESTIONS);
    questions
        .create_index(unique_index(doc! { "id": 1 }))
        .await?;
    questions
        .create_index(plain_index(doc! { "sessionId": 1, "round": 1 }))
        .await?;

    let answers = db.collection::<Document>(ANSWERS);
    answers.create_index(unique_index(doc! { "id": 1 })).await?;
    answers
        .create_index(unique_index(doc! { "userId": 1, "questionId": 1 }))
        .await?;
    answers
        .create_index(plain_index(doc! { "sessionId": 1 }))
        .await?;

    tracing::info!("MongoDB indexes ensured");
    Ok(())
}

pub struct MongoSessionRepository {
    collection: Collection<Session>,
}

impl MongoSessionRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(SESSIONS),
        }
    }
}

#[async_trait]
impl SessionRepository for MongoSessionRepository {
    async fn create(&self, session: &Session) -> RepoResult<()> {
        track_db_operation("insert_one", SESSIONS, async {
            self.collection.insert_one(session).await?;
            Ok(())
        })
        .await
    }

    async fn get_by_id(&self, id: &str) -> RepoResult<Option<Session>> {
        track_db_operation("find_one", SESSIONS, async {
            Ok(self.collection.find_one(doc! { "id": id }).await?)
        })
        .await
    }

    async fn update(&self, session: &Session) -> RepoResult<()> {
        track_db_operation("replace_one", SESSIONS, async {
            self.collection
                .replace_one(doc! { "id": &session.id }, session)
                .await?;
            Ok(())
        })
        .await
    }

    async fn list(&self) -> RepoResult<Vec<Session>> {
        track_db_operation("find", SESSIONS, async {
            let cursor = self.collection.find(doc! {}).await?;
            let mut sessions: Vec<Session> = cursor.try_collect().await?;
            sort_sessions_newest_first(&mut sessions);
            Ok(sessions)
        })
        .await
    }
}

pub struct MongoParticipantRepository {
    collection: Collection<Participant>,
}

impl MongoParticipantRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(PARTICIPANTS),
        }
    }

    async fn find_sorted(&self, filter: Document) -> RepoResult<Vec<Participant>> {
        track_db_operation("find", PARTICIPANTS, async {
            let cursor = self.collection.find(filter).await?;
            let mut participants: Vec<Participant> = cursor.try_collect().await?;
            sort_participants(&mut participants);
            Ok(participants)
        })
        .await
    }
}

#[async_trait]
impl ParticipantRepository for MongoParticipantRepository {
    async fn create(&self, participant: &Participant) -> RepoResult<()> {
        track_db_operation("insert_one", PARTICIPANTS, async {
            self.collection.insert_one(participant).await?;
            Ok(())
        })
        .await
    }

    async fn get_by_id(&self, id: &str) -> RepoResult<Option<Participant>> {
        track_db_operation("find_one", PARTICIPANTS, async {
            Ok(self.collection.find_one(doc! { "id": id }).await?)
        })
        .await
    }

    async fn update(&self, participant: &Participant) -> RepoResult<()> {
        track_db_operation("replace_one", PARTICIPANTS, async {
            self.collection
                .replace_one(doc! { "id": &participant.id }, participant)
                .await?;
            Ok(())
        })
        .await
    }

    async fn get_by_session(&self, session_id: &str) -> RepoResult<Vec<Participant>> {
        self.find_sorted(doc! { "sessionId": session_id }).await
    }

    async fn get_active_by_session(&self, session_id: &str) -> RepoResult<Vec<Participant>> {
        let statuses = vec![
            to_bson(&ParticipantStatus::Active)?,
            to_bson(&ParticipantStatus::Revived)?,
        ];
        self.find_sorted(doc! { "sessionId": session_id, "status": { "$in": statuses } })
            .await
    }

    async fn get_eliminated_by_session(&self, session_id: &str) -> RepoResult<Vec<Participant>> {
        let eliminated = to_bson(&ParticipantStatus::Eliminated)?;
        self.find_sorted(doc! { "sessionId": session_id, "status": eliminated })
            .await
    }

    async fn get_by_user_and_session(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> RepoResult<Option<Participant>> {
        track_db_operation("find_one", PARTICIPANTS, async {
            Ok(self
                .collection
                .find_one(doc! { "userId": user_id, "sessionId": session_id })
                .await?)
        })
        .await
    }

    async fn count_by_session(&self, session_id: &str) -> RepoResult<usize> {
        track_db_operation("count_documents", PARTICIPANTS, async {
            let count = self
                .collection
                .count_documents(doc! { "sessionId": session_id })
                .await?;
            Ok(count as usize)
        })
        .await
    }

    async fn add_correct_answer(&self, participant_id: &str, points: u32) -> RepoResult<()> {
        track_db_operation("update_one", PARTICIPANTS, async {
            self.collection
                .update_one(
                    doc! { "id": participant_id },
                    doc! { "$inc": { "score": points as i64, "correctAnswers": 1_i64 } },
                )
                .await?;
            Ok(())
        })
        .await
    }
}

pub struct MongoQuestionRepository {
    collection: Collection<Question>,
}

impl MongoQuestionRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(QUESTIONS),
        }
    }
}

#[async_trait]
impl QuestionRepository for MongoQuestionRepository {
    async fn create(&self, question: &Question) -> RepoResult<()> {
        track_db_operation("insert_one", QUESTIONS, async {
            self.collection.insert_one(question).await?;
            Ok(())
        })
        .await
    }

    async fn get_by_id(&self, id: &str) -> RepoResult<Option<Question>> {
        track_db_operation("find_one", QUESTIONS, async {
            Ok(self.collection.find_one(doc! { "id": id }).await?)
        })
        .await
    }

    async fn update(&self, question: &Question) -> RepoResult<()> {
        track_db_operation("replace_one", QUESTIONS, async {
            self.collection
                .replace_one(doc! { "id": &question.id }, question)
                .await?;
            Ok(())
        })
        .await
    }

    async fn get_by_session(&self, session_id: &str) -> RepoResult<Vec<Question>> {
        track_db_operation("find", QUESTIONS, async {
            let cursor = self.collection.find(doc! { "sessionId": session_id }).await?;
            let mut questions: Vec<Question> = cursor.try_collect().await?;
            sort_questions(&mut questions);
            Ok(questions)
        })
        .await
    }

    async fn get_by_session_and_round(
        &self,
        session_id: &str,
        round: u32,
    ) -> RepoResult<Option<Question>> {
        track_db_operation("find", QUESTIONS, async {
            let cursor = self
                .collection
                .find(doc! { "sessionId": session_id, "round": round as i64 })
                .await?;
            let mut questions: Vec<Question> = cursor.try_collect().await?;
            sort_questions(&mut questions);
            Ok(questions.pop())
        })
        .await
    }

    async fn close(&self, id: &str) -> RepoResult<bool> {
        let closed_at = to_bson(&Utc::now())?;
        track_db_operation("update_one", QUESTIONS, async {
            // the null filter makes the open -> closed flip happen at most once
            let result = self
                .collection
                .update_one(
                    doc! { "id": id, "closedAt": null },
                    doc! { "$set": { "closedAt": closed_at } },
                )
                .await?;
            Ok(result.modified_count == 1)
        })
        .await
    }
}

pub struct MongoAnswerRepository {
    collection: Collection<Answer>,
}

impl MongoAnswerRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(ANSWERS),
        }
    }

    async fn find_all(&self, filter: Document) -> RepoResult<Vec<Answer>> {
        track_db_operation("find", ANSWERS, async {
            let cursor = self.collection.find(filter).await?;
            let mut answers: Vec<Answer> = cursor.try_collect().await?;
            answers.sort_by(|a, b| a.answered_at.cmp(&b.answered_at));
            Ok(answers)
        })
        .await
    }
}

#[async_trait]
impl AnswerRepository for MongoAnswerRepository {
    async fn create(&self, answer: &Answer) -> RepoResult<()> {
        track_db_operation("insert_one", ANSWERS, async {
            self.collection.insert_one(answer).await?;
            Ok(())
        })
        .await
    }

    async fn get_by_id(&self, id: &str) -> RepoResult<Option<Answer>> {
        track_db_operation("find_one", ANSWERS, async {
            Ok(self.collection.find_one(doc! { "id": id }).await?)
        })
        .await
    }

    async fn get_by_user_and_question(
        &self,
        user_id: &str,
        question_id: &str,
    ) -> RepoResult<Option<Answer>> {
        track_db_operation("find_one", ANSWERS, async {
            Ok(self
                .collection
                .find_one(doc! { "userId": user_id, "questionId": question_id })
                .await?)
        })
        .await
    }

    async fn get_by_question(&self, question_id: &str) -> RepoResult<Vec<Answer>> {
        self.find_all(doc! { "questionId": question_id }).await
    }

    async fn get_by_session(&self, session_id: &str) -> RepoResult<Vec<Answer>> {
        self.find_all(doc! { "sessionId": session_id }).await
    }
}
